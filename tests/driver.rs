use ro2ct::convert::{self, ConvertError, ConvertOptions};
use ro2ct::ct;
use ro2ct::table::{Cell, Column, Table, TypeCode};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

fn sample_table() -> Table {
    Table {
        timestamp: "2024-01-01 00:00:00".to_string(),
        columns:   vec![
            Column { name: "Id".to_string(), ty: TypeCode::Dword },
            Column { name: "Name".to_string(), ty: TypeCode::String },
        ],
        rows:      vec![
            vec![Cell::Dword(1), Cell::String("Poring".to_string())],
            vec![Cell::Dword(2), Cell::String("Drops".to_string())],
        ],
    }
}

#[test]
fn ct_converts_to_an_xlsx_sibling() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("CardInfo.ct");
    fs::write(&input, ct::to_bytes(&sample_table()).unwrap()).unwrap();

    let output = convert::convert_file(&input).unwrap();
    assert_eq!(output, dir.path().join("CardInfo.xlsx"));
    assert!(output.exists());
}

#[test]
fn full_cycle_through_the_driver_is_byte_exact() {
    let dir = tempfile::tempdir().unwrap();
    let ct_path = dir.path().join("CardInfo.ct");
    let original = ct::to_bytes(&sample_table()).unwrap();
    fs::write(&ct_path, &original).unwrap();

    // .ct → .xlsx, then .xlsx → .ct in place.  The timestamp rides the
    // document property, so even the header bytes come back identical.
    let xlsx_path = convert::convert_file(&ct_path).unwrap();
    let ct_again = convert::convert_file(&xlsx_path).unwrap();
    assert_eq!(ct_again, ct_path);
    assert_eq!(fs::read(&ct_path).unwrap(), original);
}

#[test]
fn csv_converts_to_ct() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("drops.csv");
    fs::write(&input, "Id,Rate\nDWORD,FLOAT\n1,0.5\n2,1.5\n").unwrap();

    let output = convert::convert_file(&input).unwrap();
    assert_eq!(output, dir.path().join("drops.ct"));
    let table = ct::read_file(&output).unwrap();
    assert_eq!(table.rows[1], vec![Cell::Dword(2), Cell::Float(1.5)]);
}

#[test]
fn batch_continues_past_a_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.ct"), b"not a table").unwrap();
    fs::write(dir.path().join("good.ct"), ct::to_bytes(&sample_table()).unwrap()).unwrap();

    let outcomes = convert::convert_path(dir.path(), &ConvertOptions::default()).unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].input.ends_with("bad.ct"));
    assert!(!outcomes[0].succeeded());
    assert!(outcomes[1].succeeded());
    assert!(dir.path().join("good.xlsx").exists());
}

#[test]
fn failure_leaves_nothing_at_the_output_path() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.ct");
    fs::write(&input, b"not a table").unwrap();

    assert!(convert::convert_file(&input).is_err());
    assert!(!dir.path().join("bad.xlsx").exists());
    // No temporary sibling left behind either.
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn unsupported_single_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    fs::write(&input, "hello").unwrap();

    assert!(matches!(
        convert::convert_path(&input, &ConvertOptions::default()),
        Err(ConvertError::UnsupportedExtension(_))
    ));
}

#[test]
fn directories_skip_unsupported_entries() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();

    let outcomes = convert::convert_path(dir.path(), &ConvertOptions::default()).unwrap();
    assert!(outcomes.is_empty());
}

#[test]
fn recursion_is_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("nested.ct"), ct::to_bytes(&sample_table()).unwrap()).unwrap();

    let flat = convert::convert_path(dir.path(), &ConvertOptions::default()).unwrap();
    assert!(flat.is_empty());

    let deep =
        convert::convert_path(dir.path(), &ConvertOptions { recurse: true }).unwrap();
    assert_eq!(deep.len(), 1);
    assert!(sub.join("nested.xlsx").exists());
}

#[test]
fn cancellation_stops_between_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.ct"), ct::to_bytes(&sample_table()).unwrap()).unwrap();
    fs::write(dir.path().join("b.ct"), ct::to_bytes(&sample_table()).unwrap()).unwrap();

    let cancel = AtomicBool::new(true);
    cancel.store(true, Ordering::Relaxed);
    let outcomes = convert::convert_path_with(
        dir.path(),
        &ConvertOptions::default(),
        Some(&cancel),
        None,
    )
    .unwrap();
    assert!(outcomes.is_empty());
}

#[test]
fn progress_sink_sees_every_outcome() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.ct"), ct::to_bytes(&sample_table()).unwrap()).unwrap();
    fs::write(dir.path().join("bad.ct"), b"junk").unwrap();

    let mut seen = Vec::new();
    let mut sink = |outcome: &convert::FileOutcome| seen.push(outcome.succeeded());
    convert::convert_path_with(dir.path(), &ConvertOptions::default(), None, Some(&mut sink))
        .unwrap();
    assert_eq!(seen, vec![true, false]);
}
