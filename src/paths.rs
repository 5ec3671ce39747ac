use crate::config::SyncConfig;

/// Centralized helpers for remote document paths scoped to a principal.
/// Collections live at `<users_root>/<uid>/<handle><suffix>`, e.g. `users/u1/posts`.
#[inline]
pub fn user_root(cfg: &SyncConfig, uid: &str) -> String { format!("{}/{}", cfg.users_root, uid) }

/// `handle` is the singular object name (`post`), never the plural.
#[inline]
pub fn collection_path(cfg: &SyncConfig, uid: &str, handle: &str) -> String {
    format!("{}/{}{}", user_root(cfg, uid), handle, cfg.collection_suffix)
}

#[inline]
pub fn document_path(collection: &str, id: &str) -> String { format!("{}/{}", collection, id) }

/// Split a document path into (collection path, document id).
pub fn split_document_path(path: &str) -> Option<(&str, &str)> {
    let (col, id) = path.rsplit_once('/')?;
    if col.is_empty() || id.is_empty() { return None; }
    Some((col, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_is_pluralized_under_user() {
        let cfg = SyncConfig::default();
        assert_eq!(collection_path(&cfg, "u1", "post"), "users/u1/posts");
        assert_eq!(document_path("users/u1/posts", "p9"), "users/u1/posts/p9");
    }

    #[test]
    fn split_roundtrips_document_path() {
        assert_eq!(split_document_path("users/u1/days/d1"), Some(("users/u1/days", "d1")));
        assert_eq!(split_document_path("users/u1/days/"), None);
        assert_eq!(split_document_path("nodelimiter"), None);
    }
}
