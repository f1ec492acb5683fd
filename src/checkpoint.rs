//! Checkpoint write and restart read.
//!
//! Layout of `<root>/chkNNNNN`:
//!
//! - `Header`: JSON `CheckpointHeader`, time, step, box list in canonical order.
//! - `Level_0/Cell_D_BBBBB`: valid cells of box `BBBBB`, component major,
//!   linear order, raw `f64` in the byte order named by the header.
//!
//! Everything is written into `chkNNNNN.tmp` first and renamed into place
//! once every worker has synced its boxes and the staged directories are
//! synced, so a `chkNNNNN` directory always holds a complete record.
//! Ghost cells are never stored.

use crate::comm::*;
use crate::error::*;
use crate::field::*;
use crate::geometry::*;
use crate::partition::*;
use crate::util::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CHECKPOINT_FORMAT: &str = "heatchk/1";
const HEADER_FILE: &str = "Header";
const LEVEL_DIR: &str = "Level_0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxRecord {
    pub lo: Vec<i32>,
    pub hi: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointHeader {
    pub format: String,
    pub dim: usize,
    pub byte_order: String,
    pub step: usize,
    /// Human readable, `time_bits` is what restart uses.
    pub time: f64,
    pub time_bits: u64,
    pub n_comp: usize,
    pub n_ghost: usize,
    pub domain_lo: Vec<i32>,
    pub domain_hi: Vec<i32>,
    pub boxes: Vec<BoxRecord>,
}

impl CheckpointHeader {
    fn new<const GRID_DIMENSION: usize>(
        step: usize,
        time: f64,
        field: &Field<GRID_DIMENSION>,
    ) -> Self {
        let domain = field.geometry().aabb();
        CheckpointHeader {
            format: CHECKPOINT_FORMAT.to_string(),
            dim: GRID_DIMENSION,
            byte_order: native_byte_order().to_string(),
            step,
            time,
            time_bits: time.to_bits(),
            n_comp: field.n_comp(),
            n_ghost: field.n_ghost(),
            domain_lo: domain.min().as_slice().to_vec(),
            domain_hi: domain.max().as_slice().to_vec(),
            boxes: field
                .partition()
                .boxes()
                .iter()
                .map(|b| BoxRecord {
                    lo: b.min().as_slice().to_vec(),
                    hi: b.max().as_slice().to_vec(),
                })
                .collect(),
        }
    }

    /// Simulation time, bit exact.
    pub fn exact_time(&self) -> f64 {
        f64::from_bits(self.time_bits)
    }
}

fn native_byte_order() -> &'static str {
    if cfg!(target_endian = "little") {
        "little"
    } else {
        "big"
    }
}

/// `<root>/chkNNNNN`
pub fn checkpoint_dir(root: &Path, step: usize) -> PathBuf {
    root.join(format!("chk{:05}", step))
}

fn staging_dir(root: &Path, step: usize) -> PathBuf {
    root.join(format!("chk{:05}.tmp", step))
}

fn retired_dir(root: &Path, step: usize) -> PathBuf {
    root.join(format!("chk{:05}.old", step))
}

fn blob_path(dir: &Path, box_index: usize) -> PathBuf {
    dir.join(LEVEL_DIR).join(format!("Cell_D_{:05}", box_index))
}

/// Combine every worker's outcome of one phase. If any worker failed,
/// every worker returns an error, the failing ones their own.
fn collective<C: Communicator>(comm: &C, local: HeatResult<()>) -> HeatResult<()> {
    let all_ok = comm.all_agree(local.is_ok())?;
    match local {
        Err(e) => Err(e),
        Ok(()) if !all_ok => Err(HeatError::Io(std::io::Error::other(
            "checkpoint I/O failed on another worker",
        ))),
        Ok(()) => Ok(()),
    }
}

/// Write `field` as the checkpoint for `step`. Collective.
/// Returns the checkpoint directory.
pub fn write_checkpoint<const GRID_DIMENSION: usize, C: Communicator>(
    root: &Path,
    step: usize,
    time: f64,
    field: &Field<GRID_DIMENSION>,
    comm: &C,
) -> HeatResult<PathBuf> {
    profiling::scope!("checkpoint::write");
    let staging = staging_dir(root, step);
    let target = checkpoint_dir(root, step);

    let prepared = if comm.is_root() {
        prepare_staging(&staging)
    } else {
        Ok(())
    };
    collective(comm, prepared)?;

    let written = write_blobs(&staging, field);
    if let Err(e) = collective(comm, written) {
        discard_staging(comm, &staging);
        return Err(e);
    }

    let committed = if comm.is_root() {
        write_header(&staging, &CheckpointHeader::new(step, time, field))
            .and_then(|_| sync_dir(&staging.join(LEVEL_DIR)))
            .and_then(|_| sync_dir(&staging))
            .and_then(|_| commit(root, step, &staging, &target))
    } else {
        Ok(())
    };
    if let Err(e) = collective(comm, committed) {
        discard_staging(comm, &staging);
        return Err(e);
    }

    if comm.is_root() {
        log::info!("Wrote checkpoint {}", target.display());
    }
    Ok(target)
}

fn prepare_staging(staging: &Path) -> HeatResult<()> {
    if staging.exists() {
        std::fs::remove_dir_all(staging)?;
    }
    std::fs::create_dir_all(staging.join(LEVEL_DIR))?;
    Ok(())
}

fn discard_staging<C: Communicator>(comm: &C, staging: &Path) {
    if comm.is_root() {
        if let Err(e) = std::fs::remove_dir_all(staging) {
            log::warn!("could not remove {}: {e}", staging.display());
        }
    }
}

fn write_blobs<const GRID_DIMENSION: usize>(
    staging: &Path,
    field: &Field<GRID_DIMENSION>,
) -> HeatResult<()> {
    for (box_index, fab) in field.fabs() {
        let values = fab.valid_values();
        let path = blob_path(staging, box_index);
        let mut file = File::create(&path)?;
        file.write_all(bytemuck::cast_slice(&values))?;
        file.sync_all()?;
        log::debug!(
            "rank {}: wrote {} values to {}",
            field.rank(),
            values.len(),
            path.display()
        );
    }
    Ok(())
}

fn write_header(staging: &Path, header: &CheckpointHeader) -> HeatResult<()> {
    let file = File::create(staging.join(HEADER_FILE))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, header)?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| HeatError::Io(e.into_error()))?
        .sync_all()?;
    Ok(())
}

/// Move the staged record into place, replacing an older record for the same step.
fn commit(root: &Path, step: usize, staging: &Path, target: &Path) -> HeatResult<()> {
    let retired = retired_dir(root, step);
    if target.exists() {
        if retired.exists() {
            std::fs::remove_dir_all(&retired)?;
        }
        std::fs::rename(target, &retired)?;
    }
    std::fs::rename(staging, target)?;
    sync_dir(root)?;
    if retired.exists() {
        std::fs::remove_dir_all(&retired)?;
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> HeatResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> HeatResult<()> {
    Ok(())
}

/// Parse the header of the checkpoint for `step`.
pub fn read_header(root: &Path, step: usize) -> HeatResult<CheckpointHeader> {
    let dir = checkpoint_dir(root, step);
    if !dir.is_dir() {
        return Err(HeatError::CheckpointNotFound { path: dir });
    }
    let path = dir.join(HEADER_FILE);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(HeatError::CheckpointNotFound { path });
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| HeatError::corrupt(&path, format!("unreadable header, {e}")))
}

/// Restore the checkpoint for `step`: its time, the field, and the partition,
/// with ownership recomputed for the current workers. Collective.
pub fn read_checkpoint<const GRID_DIMENSION: usize, C: Communicator>(
    root: &Path,
    step: usize,
    geometry: &Geometry<GRID_DIMENSION>,
    comm: &C,
) -> HeatResult<(f64, Field<GRID_DIMENSION>, Arc<Partition<GRID_DIMENSION>>)> {
    profiling::scope!("checkpoint::read");
    let restored = read_local(root, step, geometry, comm.size(), comm.rank());
    let all_ok = comm.all_agree(restored.is_ok())?;
    match restored {
        Ok(_) if !all_ok => Err(HeatError::Io(std::io::Error::other(
            "checkpoint read failed on another worker",
        ))),
        Ok(r) => {
            if comm.is_root() {
                log::info!(
                    "Read checkpoint {} at time {}",
                    checkpoint_dir(root, step).display(),
                    r.0
                );
            }
            Ok(r)
        }
        Err(e) => Err(e),
    }
}

fn read_local<const GRID_DIMENSION: usize>(
    root: &Path,
    step: usize,
    geometry: &Geometry<GRID_DIMENSION>,
    n_workers: usize,
    rank: usize,
) -> HeatResult<(f64, Field<GRID_DIMENSION>, Arc<Partition<GRID_DIMENSION>>)> {
    let dir = checkpoint_dir(root, step);
    let header = read_header(root, step)?;
    let header_path = dir.join(HEADER_FILE);
    let time = check_header(&header, step, geometry)
        .map_err(|reason| HeatError::corrupt(&header_path, reason))?;

    let mut boxes = Vec::with_capacity(header.boxes.len());
    for (i, record) in header.boxes.iter().enumerate() {
        let aabb = AABB::<GRID_DIMENSION>::from_corner_slices(&record.lo, &record.hi)
            .ok_or_else(|| {
                HeatError::corrupt(&header_path, format!("box {i} has the wrong dimension"))
            })?;
        boxes.push(aabb);
    }
    let partition = Arc::new(
        Partition::from_boxes(geometry, boxes, n_workers)
            .map_err(|e| HeatError::corrupt(&header_path, e.to_string()))?,
    );

    let mut field = Field::define(
        geometry,
        partition.clone(),
        rank,
        header.n_comp,
        header.n_ghost,
    )?;
    for (box_index, fab) in field.fabs_mut() {
        read_blob(&blob_path(&dir, box_index), fab)?;
    }
    Ok((time, field, partition))
}

/// Returns the exact time, or why the header can't be used.
fn check_header<const GRID_DIMENSION: usize>(
    header: &CheckpointHeader,
    step: usize,
    geometry: &Geometry<GRID_DIMENSION>,
) -> Result<f64, String> {
    if header.format != CHECKPOINT_FORMAT {
        return Err(format!("unknown format {:?}", header.format));
    }
    if header.dim != GRID_DIMENSION {
        return Err(format!(
            "written for {} dimensions, running {GRID_DIMENSION}",
            header.dim
        ));
    }
    if header.byte_order != native_byte_order() {
        return Err(format!("byte order {} is not native", header.byte_order));
    }
    if header.step != step {
        return Err(format!("header is for step {}, expected {step}", header.step));
    }
    if header.n_comp != 1 || header.n_ghost != 1 {
        return Err(format!(
            "expected 1 component and 1 ghost cell, found {} and {}",
            header.n_comp, header.n_ghost
        ));
    }
    let domain = geometry.aabb();
    if header.domain_lo != domain.min().as_slice() || header.domain_hi != domain.max().as_slice() {
        return Err(format!(
            "domain {:?}..{:?} does not match {domain}",
            header.domain_lo, header.domain_hi
        ));
    }
    let time = header.exact_time();
    if !time.is_finite() || (time - header.time).abs() > 1e-12 * time.abs().max(1.0) {
        return Err(format!(
            "time {} disagrees with time_bits {:#x}",
            header.time, header.time_bits
        ));
    }
    Ok(time)
}

fn read_blob<const GRID_DIMENSION: usize>(
    path: &Path,
    fab: &mut Fab<GRID_DIMENSION>,
) -> HeatResult<()> {
    let mut file = File::open(path)
        .map_err(|e| HeatError::corrupt(path, format!("missing box data, {e}")))?;
    let n_values = fab.n_comp() * fab.valid().buffer_size();
    let Some(expected_bytes) = n_values.checked_mul(std::mem::size_of::<f64>()) else {
        return Err(HeatError::corrupt(path, format!("box {} is too large", fab.valid())));
    };
    let expected_bytes = expected_bytes as u64;
    let actual_bytes = file.metadata()?.len();
    if actual_bytes != expected_bytes {
        return Err(HeatError::corrupt(
            path,
            format!(
                "box {} needs {expected_bytes} bytes, file has {actual_bytes}",
                fab.valid()
            ),
        ));
    }
    let mut values = vec![0.0f64; n_values];
    file.read_exact(bytemuck::cast_slice_mut(&mut values))?;
    fab.set_valid_values(&values);
    Ok(())
}
