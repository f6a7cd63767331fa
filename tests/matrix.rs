use ndarray::array;
use std::io::Cursor;
use tsvtm::column::decode;
use tsvtm::io::LineCache;
use tsvtm::{Column, Corpus, CorpusError, Matrix};

fn vectors(rows: &[&str]) -> Column<Vec<f64>> {
    let mut tsv = String::from("id\thighdim\n");
    for (i, row) in rows.iter().enumerate() {
        tsv.push_str(&format!("b:{i}\t{row}\n"));
    }
    let corpus = Corpus::from_cache(LineCache::from_reader("-", Cursor::new(tsv)));
    corpus.column_with("highdim", decode::json::<Vec<f64>>())
}

#[test]
fn test_half_zero_stays_dense() -> anyhow::Result<()> {
    let matrix = vectors(&["[1,0]", "[0,2]"]).matrix::<f64>()?;
    assert!(!matrix.is_sparse());
    assert_eq!(matrix.to_dense(), array![[1.0, 0.0], [0.0, 2.0]]);
    Ok(())
}

#[test]
fn test_mostly_zero_is_sparse() -> anyhow::Result<()> {
    let matrix = vectors(&["[1,0,0]", "[0,0,3]"]).matrix::<f32>()?;
    assert!(matrix.is_sparse());
    assert_eq!(matrix.shape(), (2, 3));
    assert_eq!(matrix.row(1), vec![0.0, 0.0, 3.0]);
    assert_eq!(matrix.to_dense(), array![[1.0f32, 0.0, 0.0], [0.0, 0.0, 3.0]]);
    Ok(())
}

#[test]
fn test_only_leading_rows_decide_the_encoding() -> anyhow::Result<()> {
    let mut rows = vec!["[1,1]"; 10];
    rows.extend(["[0,0]"; 30]);
    let matrix = vectors(&rows).matrix::<f64>()?;
    assert!(!matrix.is_sparse());
    assert_eq!(matrix.nrows(), 40);
    Ok(())
}

#[test]
fn test_encodings_agree_on_products() -> anyhow::Result<()> {
    let rows = ["[1,0,0,0]", "[0,0,2,0]", "[0,3,0,0]"];
    let sparse = vectors(&rows).matrix::<f64>()?;
    let dense = Matrix::Dense(sparse.to_dense());
    assert!(sparse.is_sparse());

    let v = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(sparse.mul_vec(&v), vec![1.0, 6.0, 6.0]);
    assert_eq!(sparse.mul_vec(&v), dense.mul_vec(&v));

    let u = [1.0, 1.0, 2.0];
    assert_eq!(sparse.t_mul_vec(&u), vec![1.0, 6.0, 2.0, 0.0]);
    assert_eq!(sparse.t_mul_vec(&u), dense.t_mul_vec(&u));
    Ok(())
}

#[test]
fn test_ragged_vectors_are_rejected() {
    match vectors(&["[1,2]", "[3,4]", "[5]"]).matrix::<f64>() {
        Err(CorpusError::RaggedMatrix {
            line,
            expected,
            found,
            ..
        }) => {
            assert_eq!((line, expected, found), (4, 2, 1));
        }
        Err(other) => panic!("expected a ragged matrix error, got {other}"),
        Ok(_) => panic!("expected a ragged matrix error"),
    }
}

#[test]
fn test_empty_column_has_no_matrix() {
    assert!(matches!(
        vectors(&[]).matrix::<f64>(),
        Err(CorpusError::EmptyColumn { .. })
    ));
}

#[test]
fn test_filtered_matrix_keeps_selected_rows() -> anyhow::Result<()> {
    let column = vectors(&["[1,2]", "[3,4]", "[5,6]"]).filter("id", |id| id != "b:1");
    let matrix = column.matrix::<f64>()?;
    assert_eq!(matrix.to_dense(), array![[1.0, 2.0], [5.0, 6.0]]);
    Ok(())
}
