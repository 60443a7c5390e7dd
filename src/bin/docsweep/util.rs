use anyhow::{anyhow, Context, Result};
use log::LevelFilter;
use std::sync::Arc;

use docsweep::{FsStore, MemStore, StoreConnector};

pub fn parse_level(s: &str) -> Result<LevelFilter> {
    s.trim()
        .parse::<LevelFilter>()
        .map_err(|_| anyhow!("invalid log level '{}': use off|error|warn|info|debug|trace", s))
}

/// `fs:<dir>` or `mem:<n>`; a bare path is treated as `fs:<path>`.
pub fn open_store(spec: &str, collection: &str) -> Result<Arc<dyn StoreConnector>> {
    if let Some(n) = spec.strip_prefix("mem:") {
        let count: usize = n
            .trim()
            .parse()
            .with_context(|| format!("invalid record count in store spec '{}'", spec))?;
        return Ok(Arc::new(MemStore::seeded(collection, count)));
    }
    let dir = spec.strip_prefix("fs:").unwrap_or(spec);
    if dir.is_empty() {
        return Err(anyhow!("empty store path in '{}'", spec));
    }
    Ok(Arc::new(FsStore::open(dir)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level(" WARN ").unwrap(), LevelFilter::Warn);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn mem_store_spec() {
        let s = open_store("mem:3", "c").unwrap();
        assert!(s.describe().contains("3 record(s)"));
        assert!(open_store("mem:x", "c").is_err());
        assert!(open_store("fs:", "c").is_err());
    }
}
