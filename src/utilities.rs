use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

pub fn dump_default_to_json_file<T>(filename: impl AsRef<Path>) -> Result<()>
where
    T: Default + Serialize,
{
    let file = fs::File::create(filename)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &T::default())?;
    Ok(())
}

pub fn read_json_file<T>(filename: impl AsRef<Path>) -> Result<T>
where
    T: DeserializeOwned,
{
    let file = fs::File::open(filename)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
