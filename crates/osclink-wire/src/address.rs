//! Helpers over `/`-delimited OSC addresses.

/// Address of the root query, which lists every handler.
pub const ROOT: &str = "/";

pub fn is_root_query(address: &str) -> bool {
    address == ROOT
}

/// A query asks a handler to enumerate; it ends with `/`.
pub fn is_query(address: &str) -> bool {
    address.len() > 1 && address.ends_with('/')
}

/// The non-empty elements of `address`, in order.
pub fn elements(address: &str) -> impl Iterator<Item = &str> {
    address.split('/').filter(|segment| !segment.is_empty())
}

/// Element `index`, where element 0 names the handler.
pub fn element(address: &str, index: usize) -> Option<&str> {
    elements(address).nth(index)
}

/// Number of non-empty elements.
pub fn element_count(address: &str) -> usize {
    elements(address).count()
}

/// The address without its leading `/`, as matched against handler names.
pub fn strip_root(address: &str) -> &str {
    address.strip_prefix('/').unwrap_or(address)
}
