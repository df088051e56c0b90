//! 🗜️ Zip in, zip out, and a tape measure for folders.
//!
//! All blocking. Callers run these on `spawn_blocking`.

use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{AquaError, AquaResult};

/// 📏 Total bytes under `path`. A file is its own size.
pub fn folder_size(path: &Path) -> AquaResult<u64> {
    if !path.exists() {
        return Err(AquaError::PathNotFound(path.display().to_string()));
    }
    let metadata = fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        total += folder_size(&entry?.path())?;
    }
    Ok(total)
}

pub fn is_zip_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// 🗜️ `source` as zip bytes. An existing `.zip` is passed through untouched.
pub fn zip_to_bytes(source: &Path) -> AquaResult<Vec<u8>> {
    if is_zip_file(source) {
        return Ok(fs::read(source)?);
    }
    let the_cursor = write_zip(source, Cursor::new(Vec::new()))?;
    Ok(the_cursor.into_inner())
}

/// 🗜️ `source` as a zip file at `destination`. Returns the archive size.
pub fn zip_to_file(source: &Path, destination: &Path) -> AquaResult<u64> {
    if is_zip_file(source) {
        return Ok(fs::copy(source, destination)?);
    }
    let the_file = write_zip(source, File::create(destination)?)?;
    Ok(the_file.metadata()?.len())
}

fn write_zip<W: Write + Seek>(source: &Path, sink: W) -> AquaResult<W> {
    if !source.exists() {
        return Err(AquaError::PathNotFound(source.display().to_string()));
    }
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(sink);

    if source.is_file() {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        writer.start_file(name, options)?;
        writer.write_all(&fs::read(source)?)?;
        return Ok(writer.finish()?);
    }

    let mut the_files = Vec::new();
    collect_files(source, &mut the_files)?;
    the_files.sort();
    for file in the_files {
        let relative = file.strip_prefix(source).unwrap_or(&file);
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, options)?;
        let mut the_reader = File::open(&file)?;
        std::io::copy(&mut the_reader, &mut writer)?;
    }
    Ok(writer.finish()?)
}

fn collect_files(dir: &Path, into: &mut Vec<PathBuf>) -> AquaResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, into)?;
        } else {
            into.push(path);
        }
    }
    Ok(())
}

/// 📂 Unpack zip bytes into `target_dir`.
pub fn unzip_bytes(bytes: Vec<u8>, target_dir: &Path) -> AquaResult<()> {
    unzip_reader(Cursor::new(bytes), target_dir)
}

pub fn unzip_file(archive: &Path, target_dir: &Path) -> AquaResult<()> {
    unzip_reader(File::open(archive)?, target_dir)
}

fn unzip_reader<R: Read + Seek>(reader: R, target_dir: &Path) -> AquaResult<()> {
    fs::create_dir_all(target_dir)?;
    let mut archive = ZipArchive::new(reader)?;
    archive.extract(target_dir)?;
    Ok(())
}
