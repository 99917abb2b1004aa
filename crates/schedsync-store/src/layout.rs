//! Object key layout under a shared prefix.

/// Maps object names to keys under a normalized prefix.
///
/// `gtfs`, `gtfs/` and `/gtfs/` all give keys like `gtfs/hash.txt`;
/// an empty prefix gives bare names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLayout {
    prefix: String,
}

impl ObjectLayout {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
        }
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name.trim_start_matches('/'))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let parts: Vec<&str> = prefix.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("{}/", parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_variants_agree() {
        for p in ["gtfs", "gtfs/", "/gtfs/", "//gtfs//"] {
            assert_eq!(ObjectLayout::new(p).key("hash.txt"), "gtfs/hash.txt", "prefix {p:?}");
        }
    }

    #[test]
    fn empty_prefix() {
        let layout = ObjectLayout::new("");
        assert_eq!(layout.key("gtfs.zip"), "gtfs.zip");
        assert_eq!(ObjectLayout::new("/").key("gtfs.zip"), "gtfs.zip");
    }

    #[test]
    fn nested_prefix() {
        assert_eq!(ObjectLayout::new("transit/carris").key("gtfs.zip"), "transit/carris/gtfs.zip");
    }

    #[test]
    fn name_leading_slash_dropped() {
        assert_eq!(ObjectLayout::new("gtfs").key("/hash.txt"), "gtfs/hash.txt");
    }
}
