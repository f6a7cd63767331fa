use std::io::{Cursor, Write};
use tempfile::NamedTempFile;
use tsvtm::column::decode;
use tsvtm::io::{LineCache, OutputFile, Resource};
use tsvtm::{Corpus, CorpusError};

fn corpus(tsv: &str) -> Corpus {
    Corpus::from_cache(LineCache::from_reader("-", Cursor::new(tsv.to_string())))
}

fn rows(corpus: &Corpus) -> anyhow::Result<Vec<String>> {
    Ok(corpus.iterate()?.collect::<Result<Vec<_>, _>>()?)
}

const BOOKS: &str = "id\tcontent\tcluster\tlowdim\n\
                     a:1\tone\t0\t[1,0]\n\
                     a:2\ttwo\t1\t[0,1]\n\
                     b:1\tthree\t0\t[1,1]\n";

#[test]
fn test_strip_hides_columns_in_any_order() -> anyhow::Result<()> {
    let corpus = corpus(BOOKS);
    corpus.ensure_loaded()?;

    let once = rows(&corpus.strip("lowdim"))?;
    assert_eq!(once[0], "id\tcontent\tcluster");
    assert_eq!(once[1], "a:1\tone\t0");

    let ab = rows(&corpus.strip("cluster").strip("lowdim"))?;
    let ba = rows(&corpus.strip("lowdim").strip("cluster"))?;
    assert_eq!(ab, ba);
    assert_eq!(ab, vec!["id\tcontent", "a:1\tone", "a:2\ttwo", "b:1\tthree"]);

    // Unknown columns are ignored and the original view is untouched.
    assert_eq!(rows(&corpus.strip("nope"))?, rows(&corpus)?);
    assert!(corpus.excluded().is_empty());
    Ok(())
}

#[test]
fn test_rows_round_trip_through_output_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("copy.tsv");
    let source = corpus(BOOKS);

    let mut out = OutputFile::create(Resource::from_path(&path))?;
    for row in source.iterate()? {
        out.write_line(&row?)?;
    }
    out.finish()?;

    let copy = Corpus::open(Resource::from_path(&path))?;
    assert!(copy.cache().is_seekable());
    assert_eq!(rows(&copy)?, rows(&source)?);
    assert_eq!(std::fs::read_to_string(&path)?, BOOKS);
    Ok(())
}

#[test]
fn test_empty_input_has_no_header() {
    let empty = corpus("");
    match empty.iterate() {
        Err(CorpusError::EmptyInput { source_name }) => assert_eq!(source_name, "-"),
        Err(other) => panic!("expected an empty input error, got {other}"),
        Ok(_) => panic!("expected an empty input error"),
    }
}

#[test]
fn test_header_only_has_empty_columns() -> anyhow::Result<()> {
    let corpus = corpus("id\tcluster\n");
    corpus.ensure_loaded()?;
    assert_eq!(rows(&corpus)?, vec!["id\tcluster"]);
    assert_eq!(corpus.column("cluster").len()?, 0);
    assert!(matches!(
        corpus.column("cluster").peek(),
        Err(CorpusError::EmptyColumn { .. })
    ));
    Ok(())
}

#[test]
fn test_missing_target_and_filter_columns() -> anyhow::Result<()> {
    let corpus = corpus(BOOKS);
    corpus.ensure_loaded()?;

    match corpus.column("highdim").iterate() {
        Err(CorpusError::MissingColumn { column }) => assert_eq!(column, "highdim"),
        _ => panic!("expected a missing column error"),
    }
    match corpus.column("id").filter("topic", |_| true).iterate() {
        Err(CorpusError::MissingColumn { column }) => assert_eq!(column, "topic"),
        _ => panic!("expected a missing column error"),
    }
    // A stripped column is gone from the view.
    assert!(matches!(
        corpus.strip("cluster").column("cluster").iterate(),
        Err(CorpusError::MissingColumn { .. })
    ));
    Ok(())
}

#[test]
fn test_filters_combine_as_conjunction() -> anyhow::Result<()> {
    let corpus = corpus(BOOKS);
    corpus.ensure_loaded()?;

    let ids = corpus.column("id");
    let in_zero = ids.filter("cluster", |c| c == "0");
    let in_zero_book_b = in_zero.filter("id", |id| id.starts_with("b:"));

    let collect = |column: &tsvtm::Column<String>| -> anyhow::Result<Vec<String>> {
        Ok(column.iterate()?.collect::<Result<Vec<_>, _>>()?)
    };
    assert_eq!(collect(&ids)?, vec!["a:1", "a:2", "b:1"]);
    assert_eq!(collect(&in_zero)?, vec!["a:1", "b:1"]);
    assert_eq!(collect(&in_zero_book_b)?, vec!["b:1"]);
    assert_eq!(in_zero.len()?, 2);
    assert_eq!(in_zero_book_b.peek()?, "b:1");
    Ok(())
}

#[test]
fn test_decode_failures_name_the_line() -> anyhow::Result<()> {
    let corpus = corpus("id\tn\na\t1\nb\tx\n");
    corpus.ensure_loaded()?;
    let numbers = corpus.column_with("n", decode::parse::<u32>());
    let decoded: Vec<_> = numbers.iterate()?.collect();
    assert_eq!(decoded[0].as_ref().ok(), Some(&1));
    match &decoded[1] {
        Err(CorpusError::Decode { column, line, .. }) => {
            assert_eq!(column, "n");
            assert_eq!(*line, 3);
        }
        _ => panic!("expected a decode error"),
    }
    Ok(())
}

#[test]
fn test_short_rows_are_reported() -> anyhow::Result<()> {
    let corpus = corpus("id\tcluster\na\t0\nb\n");
    corpus.ensure_loaded()?;
    let clusters: Vec<_> = corpus.column("cluster").iterate()?.collect();
    assert!(matches!(clusters[1], Err(CorpusError::ShortRow { line: 3, .. })));
    Ok(())
}

#[test]
fn test_stdin_like_input_feeds_several_columns() -> anyhow::Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(BOOKS.as_bytes())?;
    file.flush()?;

    // The same content behind a one-shot reader behaves like the file once loaded.
    let stream = corpus(BOOKS);
    stream.ensure_loaded()?;
    let file = Corpus::open(Resource::from_path(file.path()))?;
    for corpus in [&stream, &file] {
        let ids = corpus.column("id").iterate()?;
        let clusters = corpus.column("cluster").iterate()?;
        let zipped = ids
            .zip(clusters)
            .map(|(id, c)| -> Result<String, CorpusError> { Ok(format!("{}={}", id?, c?)) })
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(zipped, vec!["a:1=0", "a:2=1", "b:1=0"]);
    }
    Ok(())
}

#[test]
fn test_vector_columns_round_trip_through_a_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("model.tsv");
    let mut out = OutputFile::create(Resource::from_path(&path))?;
    out.write_row(["id", "content", "highdim", "lowdim"])?;
    for (id, content) in [("d:1", "first"), ("d:2", "second"), ("d:3", "third")] {
        out.write_row([id, content, "[1,2,3]", "[0.5]"])?;
    }
    out.finish()?;

    let corpus = Corpus::open(Resource::from_path(&path))?;
    let highdim = corpus.column_with("highdim", decode::json::<Vec<f64>>());
    let values: Vec<Vec<f64>> = highdim.iterate()?.collect::<Result<_, _>>()?;
    assert_eq!(values, vec![vec![1.0, 2.0, 3.0]; 3]);
    assert_eq!(highdim.len()?, 3);

    // A second pass decodes the same values.
    let again: Vec<Vec<f64>> = highdim.iterate()?.collect::<Result<_, _>>()?;
    assert_eq!(values, again);

    let lowdim = corpus.column_with("lowdim", decode::json::<Vec<f64>>());
    assert_eq!(lowdim.peek()?, vec![0.5]);
    assert_eq!(corpus.len()?, 4);
    Ok(())
}

#[test]
fn test_zero_byte_file_is_empty_input() -> anyhow::Result<()> {
    let file = NamedTempFile::new()?;
    let corpus = Corpus::open(Resource::from_path(file.path()))?;
    assert!(matches!(corpus.iterate(), Err(CorpusError::EmptyInput { .. })));
    assert!(matches!(
        corpus.column("id").iterate(),
        Err(CorpusError::EmptyInput { .. })
    ));
    Ok(())
}
