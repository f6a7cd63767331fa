use tsvtm::io::{Compression, OutputFile, Resource};

#[test]
fn test_codec_from_suffix() {
    assert_eq!(Compression::from_path("corpus.tsv.gz"), Compression::Gzip);
    assert_eq!(Compression::from_path("corpus.tsv.bz2"), Compression::Bzip2);
    assert_eq!(Compression::from_path("corpus.tsv.xz"), Compression::Xz);
    assert_eq!(Compression::from_path("corpus.tsv"), Compression::Plain);
    assert_eq!(Compression::from_path("corpus.GZ"), Compression::Plain);
    assert_eq!(Resource::parse("-").compression(), Compression::Plain);
}

#[cfg(any(
    feature = "compression-gzip",
    feature = "compression-bzip2",
    feature = "compression-xz"
))]
mod compression_tests {
    use super::*;
    use std::io::Read;
    use tsvtm::Corpus;

    const SAMPLE: &str = "id\tcontent\na:1\tfirst page\na:2\tsecond page\n";

    fn write_corpus(resource: Resource) -> anyhow::Result<()> {
        let mut out = OutputFile::create(resource)?;
        for line in SAMPLE.lines() {
            out.write_line(line)?;
        }
        out.finish()?;
        Ok(())
    }

    fn roundtrip(extension: &str, codec: Compression) -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(format!("corpus.tsv{extension}"));
        let resource = Resource::from_path(&path);
        assert_eq!(resource.compression(), codec);
        write_corpus(resource.clone())?;

        // The bytes on disk are not the plain text.
        let mut raw = Vec::new();
        std::fs::File::open(&path)?.read_to_end(&mut raw)?;
        assert_ne!(raw, SAMPLE.as_bytes());

        let corpus = Corpus::open(resource)?;
        assert!(corpus.cache().is_seekable());
        let rows: Vec<String> = corpus.iterate()?.collect::<Result<_, _>>()?;
        assert_eq!(rows, SAMPLE.lines().collect::<Vec<_>>());
        let ids: Vec<String> = corpus.column("id").iterate()?.collect::<Result<_, _>>()?;
        assert_eq!(ids, vec!["a:1", "a:2"]);
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_roundtrip() -> anyhow::Result<()> {
        roundtrip(".gz", Compression::Gzip)
    }

    #[cfg(feature = "compression-bzip2")]
    #[test]
    fn test_bzip2_roundtrip() -> anyhow::Result<()> {
        roundtrip(".bz2", Compression::Bzip2)
    }

    #[cfg(feature = "compression-xz")]
    #[test]
    fn test_xz_roundtrip() -> anyhow::Result<()> {
        roundtrip(".xz", Compression::Xz)
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_trailer_written_by_finish() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("finished.tsv.gz");
        write_corpus(Resource::from_path(&path))?;

        let raw = std::fs::read(&path)?;
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        // The trailer ends with the uncompressed size, little-endian.
        let isize = u32::from_le_bytes(raw[raw.len() - 4..].try_into()?);
        assert_eq!(isize as usize, SAMPLE.len());

        // A single-member decoder rejects a stream without its trailer.
        let mut text = String::new();
        flate2::read::GzDecoder::new(raw.as_slice()).read_to_string(&mut text)?;
        assert_eq!(text, SAMPLE);
        Ok(())
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn test_gzip_concatenated_members() -> anyhow::Result<()> {
        use std::io::Write;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("joined.tsv.gz");
        let mut joined = Vec::new();
        for part in ["id\n", "a:1\n"] {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(part.as_bytes())?;
            joined.extend(encoder.finish()?);
        }
        std::fs::write(&path, joined)?;

        let corpus = Corpus::open(Resource::from_path(&path))?;
        let rows: Vec<String> = corpus.iterate()?.collect::<Result<_, _>>()?;
        assert_eq!(rows, vec!["id", "a:1"]);
        Ok(())
    }
}
