#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Entry content for [`build_zip`]
pub enum Item<'a> {
    Stored(&'a str, &'a [u8]),
    Deflated(&'a str, &'a [u8]),
    Dir(&'a str),
}

fn options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::default())
}

/// Build an in-memory archive with entries in the given order,
/// all stamped 1980-01-01 00:00:00.
pub fn build_zip(items: &[Item]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for item in items {
        match item {
            Item::Stored(name, data) => {
                writer.start_file(*name, options(CompressionMethod::Stored)).unwrap();
                writer.write_all(data).unwrap();
            }
            Item::Deflated(name, data) => {
                writer.start_file(*name, options(CompressionMethod::Deflated)).unwrap();
                writer.write_all(data).unwrap();
            }
            Item::Dir(name) => {
                writer.add_directory(*name, options(CompressionMethod::Stored)).unwrap();
            }
        }
    }

    writer.finish().unwrap().into_inner()
}
