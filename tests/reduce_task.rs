use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use mapreduce_reduce::{apps, utils, ReduceError, ReduceTask, Stage};
use test_utils::{read_output, sequential_reduce, write_partition};

fn partition_path(dir: &Path, job: &str, map_task: u32, reduce_task: u32) -> PathBuf {
    dir.join(utils::reduce_name(job, map_task, reduce_task))
}

fn records(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn sums_values_across_partitions() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    write_partition(&partition_path(dir.path(), "e2e", 0, 0), &[("a", "1"), ("b", "2")])?;
    write_partition(&partition_path(dir.path(), "e2e", 1, 0), &[("a", "3")])?;

    let summary = ReduceTask::new("e2e", 0, 2, &out)
        .work_dir(dir.path())
        .run(&apps::sum)?;

    assert_eq!(summary.input_records, 3);
    assert_eq!(summary.keys, 2);
    assert_eq!(read_output(&out)?, records(&[("a", "4"), ("b", "2")]));
    Ok(())
}

#[test]
fn calls_reduce_once_per_key_with_all_values() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    let partitions = vec![
        vec![("x", "1"), ("y", "2"), ("x", "3"), ("z", "4")],
        vec![],
        vec![("y", "5"), ("x", "6"), ("y", "7")],
    ];
    for (m, partition) in partitions.iter().enumerate() {
        write_partition(&partition_path(dir.path(), "once", m as u32, 4), partition)?;
    }

    let calls: RefCell<HashMap<String, Vec<Vec<String>>>> = RefCell::new(HashMap::new());
    ReduceTask::new("once", 4, 3, &out)
        .work_dir(dir.path())
        .run(&|key: &str, values: &[&str]| {
            calls
                .borrow_mut()
                .entry(key.to_string())
                .or_default()
                .push(values.iter().map(|v| v.to_string()).collect());
            values.join("+")
        })?;

    let calls = calls.into_inner();
    assert_eq!(calls.len(), 3);
    for (key, expected) in [("x", vec!["1", "3", "6"]), ("y", vec!["2", "5", "7"]), ("z", vec!["4"])] {
        let invocations = &calls[key];
        assert_eq!(invocations.len(), 1, "{key} reduced more than once");
        let mut values = invocations[0].clone();
        values.sort();
        assert_eq!(values, expected);
    }

    assert_eq!(
        read_output(&out)?,
        sequential_reduce(&partitions, |_key, values| values.join("+"))
    );
    Ok(())
}

#[test]
fn output_is_sorted_by_key() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    write_partition(
        &partition_path(dir.path(), "sorted", 0, 1),
        &[("pear", "1"), ("apple", "1"), ("fig", "1")],
    )?;
    write_partition(
        &partition_path(dir.path(), "sorted", 1, 1),
        &[("banana", "1"), ("apple", "1")],
    )?;

    ReduceTask::new("sorted", 1, 2, &out)
        .work_dir(dir.path())
        .run(&apps::count)?;

    let keys: Vec<String> = read_output(&out)?.into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["apple", "banana", "fig", "pear"]);
    Ok(())
}

#[test]
fn identical_inputs_give_identical_bytes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_partition(
        &partition_path(dir.path(), "det", 0, 0),
        &[("k2", "b"), ("k1", "a"), ("k3", "c"), ("k1", "d")],
    )?;
    write_partition(
        &partition_path(dir.path(), "det", 1, 0),
        &[("k3", "e"), ("k2", "f")],
    )?;

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    for out in [&first, &second] {
        ReduceTask::new("det", 0, 2, out)
            .work_dir(dir.path())
            .run(&apps::concat)?;
    }

    assert_eq!(fs::read(&first)?, fs::read(&second)?);
    Ok(())
}

#[test]
fn swapped_partition_files_give_identical_bytes() -> Result<(), Box<dyn std::error::Error>> {
    let first_dir = tempfile::tempdir()?;
    let second_dir = tempfile::tempdir()?;
    let left: &[(&str, &str)] = &[("a", "1"), ("b", "2")];
    let right: &[(&str, &str)] = &[("b", "3"), ("c", "4")];

    write_partition(&partition_path(first_dir.path(), "swap", 0, 0), left)?;
    write_partition(&partition_path(first_dir.path(), "swap", 1, 0), right)?;
    write_partition(&partition_path(second_dir.path(), "swap", 0, 0), right)?;
    write_partition(&partition_path(second_dir.path(), "swap", 1, 0), left)?;

    let first = first_dir.path().join("out");
    let second = second_dir.path().join("out");
    ReduceTask::new("swap", 0, 2, &first)
        .work_dir(first_dir.path())
        .run(&apps::sum)?;
    ReduceTask::new("swap", 0, 2, &second)
        .work_dir(second_dir.path())
        .run(&apps::sum)?;

    assert_eq!(fs::read(&first)?, fs::read(&second)?);
    Ok(())
}

#[test]
fn empty_partitions_give_empty_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    for m in 0..3 {
        write_partition(&partition_path(dir.path(), "empty", m, 0), &[])?;
    }

    let calls = RefCell::new(0);
    let summary = ReduceTask::new("empty", 0, 3, &out)
        .work_dir(dir.path())
        .run(&|_key: &str, _values: &[&str]| {
            *calls.borrow_mut() += 1;
            String::new()
        })?;

    assert_eq!(summary.keys, 0);
    assert_eq!(*calls.borrow(), 0);
    assert!(out.exists());
    assert_eq!(fs::metadata(&out)?.len(), 0);
    Ok(())
}

#[test]
fn zero_map_tasks_give_empty_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");

    let summary = ReduceTask::new("none", 0, 0, &out)
        .work_dir(dir.path())
        .run(&apps::count)?;

    assert_eq!(summary.input_records, 0);
    assert!(read_output(&out)?.is_empty());
    Ok(())
}

#[test]
fn malformed_record_aborts_without_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    write_partition(&partition_path(dir.path(), "bad", 0, 0), &[("a", "1")])?;
    fs::write(
        partition_path(dir.path(), "bad", 1, 0),
        "{\"Key\":\"b\",\"Value\":\"2\"}\n{\"Key\":\"c\",\"Val",
    )?;

    let calls = RefCell::new(0);
    let err = ReduceTask::new("bad", 0, 2, &out)
        .work_dir(dir.path())
        .run(&|_key: &str, _values: &[&str]| {
            *calls.borrow_mut() += 1;
            String::new()
        })
        .unwrap_err();

    assert!(matches!(err, ReduceError::Decode { .. }));
    assert_eq!(err.stage(), Stage::Decode);
    assert_eq!(err.path(), &partition_path(dir.path(), "bad", 1, 0));
    assert_eq!(*calls.borrow(), 0);
    assert!(!out.exists());

    let leftovers: Vec<_> = fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn failed_run_keeps_previous_output() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    write_partition(&partition_path(dir.path(), "keep", 0, 0), &[("a", "1")])?;

    let task = ReduceTask::new("keep", 0, 1, &out).work_dir(dir.path());
    task.run(&apps::count)?;
    let committed = fs::read(&out)?;

    fs::write(partition_path(dir.path(), "keep", 0, 0), "not a record")?;
    let err = task.run(&apps::count).unwrap_err();

    assert_eq!(err.stage(), Stage::Decode);
    assert_eq!(fs::read(&out)?, committed);
    Ok(())
}

#[test]
fn missing_partition_is_input_unavailable() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    write_partition(&partition_path(dir.path(), "lost", 0, 0), &[("a", "1")])?;

    let err = ReduceTask::new("lost", 0, 2, &out)
        .work_dir(dir.path())
        .run(&apps::count)
        .unwrap_err();

    assert!(matches!(err, ReduceError::InputUnavailable { .. }));
    assert!(err.to_string().contains("mrtmp.lost-1-0"));
    assert!(!out.exists());
    Ok(())
}

#[test]
fn unwritable_output_is_output_create() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_partition(&partition_path(dir.path(), "blocked", 0, 0), &[("a", "1")])?;

    // A regular file where the output directory should be.
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "")?;

    let err = ReduceTask::new("blocked", 0, 1, blocker.join("out"))
        .work_dir(dir.path())
        .run(&apps::count)
        .unwrap_err();

    assert_eq!(err.stage(), Stage::CreateOutput);
    Ok(())
}

#[test]
fn output_path_taken_by_directory_fails_commit() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    write_partition(&partition_path(dir.path(), "taken", 0, 0), &[("a", "1")])?;

    let out = dir.path().join("outdir");
    fs::create_dir(&out)?;
    fs::write(out.join("existing"), "keep me")?;

    let err = ReduceTask::new("taken", 0, 1, &out)
        .work_dir(dir.path())
        .run(&apps::count)
        .unwrap_err();

    assert!(matches!(err, ReduceError::OutputCommit { .. }));
    assert_eq!(err.stage(), Stage::Commit);
    assert_eq!(err.path(), &out);
    assert_eq!(fs::read_to_string(out.join("existing"))?, "keep me");

    let mut names: Vec<String> = fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["mrtmp.taken-0-0", "outdir"]);
    Ok(())
}
