use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};

pub use glob;

pub type Record = (String, String);

/// Writes `records` as an intermediate partition file, one JSON object per line.
pub fn write_partition(path: &Path, records: &[(&str, &str)]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    for (key, value) in records {
        let line = serde_json::json!({ "Key": key, "Value": value });
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Reads a reduce output file back into `(key, value)` pairs, in file order.
pub fn read_output(path: &Path) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(path)?);
    let mut output = vec![];
    for value in serde_json::Deserializer::from_reader(reader).into_iter::<serde_json::Value>() {
        let value = value?;
        let key = value["Key"].as_str().ok_or("record without Key")?;
        let reduced = value["Value"].as_str().ok_or("record without Value")?;
        output.push((key.to_string(), reduced.to_string()));
    }
    Ok(output)
}

/// Sequential reference: groups every partition's records in memory and
/// reduces each key once.
pub fn sequential_reduce<F>(partitions: &[Vec<(&str, &str)>], reducef: F) -> Vec<Record>
where
    F: Fn(&str, &[&str]) -> String,
{
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for partition in partitions {
        for (key, value) in partition {
            grouped.entry(*key).or_default().push(*value);
        }
    }
    grouped
        .into_iter()
        .map(|(key, values)| (key.to_string(), reducef(key, &values)))
        .collect()
}

/// Checks that the union of all output files equals `expected`, and that no
/// key shows up twice.
pub fn verify_output(
    expected: &[Record],
    test_out_paths: glob::Paths,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut test_output: Vec<Record> = vec![];
    for test_out_path in test_out_paths {
        test_output.extend(read_output(&test_out_path?)?);
    }
    test_output.sort();

    let mut expected = expected.to_vec();
    expected.sort();

    let mut keys: Vec<&String> = test_output.iter().map(|(key, _)| key).collect();
    keys.dedup();
    assert_eq!(keys.len(), test_output.len(), "duplicate keys in output");
    assert_eq!(expected, test_output);

    Ok(())
}

/// Number of file descriptors currently open in this process.
#[cfg(target_os = "linux")]
pub fn open_fd_count() -> std::io::Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir("/proc/self/fd")? {
        entry?;
        count += 1;
    }
    Ok(count)
}
