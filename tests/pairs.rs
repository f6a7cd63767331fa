use std::io::{Cursor, Write};
use tempfile::NamedTempFile;
use tsvtm::io::{LineCache, Resource};
use tsvtm::{CorpusError, PagePairs};

#[test]
fn test_pairs_from_file() -> anyhow::Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "a:1\ta:2")?;
    writeln!(file, "a:2\ta:3")?;
    file.flush()?;

    let pairs = PagePairs::open(Resource::from_path(file.path()))?;
    let read: Vec<(String, String)> = pairs.iterate()?.collect::<Result<_, _>>()?;
    assert_eq!(
        read,
        vec![
            ("a:1".to_string(), "a:2".to_string()),
            ("a:2".to_string(), "a:3".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn test_malformed_pair_names_its_line() -> anyhow::Result<()> {
    let pairs = PagePairs::from_cache(LineCache::from_reader("-", Cursor::new("a\tb\nc\n")));
    pairs.ensure_loaded()?;
    let read: Vec<_> = pairs.iterate()?.collect();
    assert!(read[0].is_ok());
    assert!(matches!(read[1], Err(CorpusError::MalformedPair { line: 2 })));

    let too_many = PagePairs::from_cache(LineCache::from_reader("-", Cursor::new("a\tb\tc\n")));
    let read: Vec<_> = too_many.iterate()?.collect();
    assert!(matches!(read[0], Err(CorpusError::MalformedPair { line: 1 })));
    Ok(())
}
