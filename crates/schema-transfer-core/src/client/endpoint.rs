//! URL helpers for the backend's REST layout.

const SYSTEM_PREFIX: &str = "directus_";

/// REST path of a collection's items, with a leading slash.
///
/// Built-in collections live at their own top-level route
/// (`directus_users` -> `/users`); everything else is under `/items`.
pub fn collection_endpoint(collection: &str) -> String {
    match collection.strip_prefix(SYSTEM_PREFIX) {
        Some(system) => format!("/{}", system),
        None => format!("/items/{}", collection),
    }
}

/// Root URL of an instance from the URL of a page in its admin app.
///
/// Everything before the `admin` path segment is kept, with a trailing slash.
/// Without an `admin` segment the whole input is treated as the root.
pub fn public_url_from_admin(href: &str) -> String {
    let parts: Vec<&str> = href.split('/').collect();
    let root = match parts.iter().position(|part| *part == "admin") {
        Some(index) => parts[..index].join("/"),
        None => href.trim_end_matches('/').to_string(),
    };
    format!("{}/", root)
}

/// Join a base URL and a path without doubling or dropping slashes.
pub fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
