use crate::error::*;
use crate::field::*;
use crate::util::*;
use std::path::{Path, PathBuf};
use vtkio::model::*;

/// Sink for plot output. `plot` is called on every worker,
/// each writes what it owns.
pub trait Plotter<const GRID_DIMENSION: usize> {
    fn plot(
        &mut self,
        step: usize,
        time: f64,
        field: &Field<GRID_DIMENSION>,
    ) -> HeatResult<()>;
}

/// Writes `<root>/pltNNNNN/box_BBBBB.vtu`, one unstructured grid per box,
/// quads in 2D and hexahedra in 3D, with the field as cell data.
pub struct VtkPlotter {
    root: PathBuf,
}

impl VtkPlotter {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        VtkPlotter {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn plot_dir(&self, step: usize) -> PathBuf {
        self.root.join(format!("plt{:05}", step))
    }

    pub fn box_file(&self, step: usize, box_index: usize) -> PathBuf {
        self.plot_dir(step).join(format!("box_{:05}.vtu", box_index))
    }
}

impl<const GRID_DIMENSION: usize> Plotter<GRID_DIMENSION> for VtkPlotter {
    fn plot(
        &mut self,
        step: usize,
        time: f64,
        field: &Field<GRID_DIMENSION>,
    ) -> HeatResult<()> {
        profiling::scope!("vtk::plot");
        std::fs::create_dir_all(self.plot_dir(step))?;
        for (box_index, fab) in field.fabs() {
            let path = self.box_file(step, box_index);
            log::debug!("Writing vtk: {:?}", path);
            box_to_vtk(field, fab, time)
                .export(&path)
                .map_err(|e| HeatError::Plot(format!("{}: {e}", path.display())))?;
        }
        if field.rank() == 0 {
            log::info!("Wrote plot {} at time {time}", self.plot_dir(step).display());
        }
        Ok(())
    }
}

/// Corners of the unit cell in VTK quad / hexahedron order.
fn cell_corners<const GRID_DIMENSION: usize>() -> Vec<Coord<GRID_DIMENSION>> {
    let square = [(0, 0), (1, 0), (1, 1), (0, 1)];
    let layers = if GRID_DIMENSION == 3 { 2 } else { 1 };
    let mut corners = Vec::with_capacity(4 * layers);
    for layer in 0..layers {
        for (a, b) in square {
            let mut c = Coord::<GRID_DIMENSION>::zeros();
            c[0] = a;
            c[1] = b;
            if GRID_DIMENSION == 3 {
                c[2] = layer as i32;
            }
            corners.push(c);
        }
    }
    corners
}

fn box_to_vtk<const GRID_DIMENSION: usize>(
    field: &Field<GRID_DIMENSION>,
    fab: &Fab<GRID_DIMENSION>,
    time: f64,
) -> Vtk {
    let geometry = field.geometry();
    let dx = geometry.cell_size();
    let valid = *fab.valid();

    // Cell corner points, always given three coordinates
    let point_box = AABB::from_mm(valid.min(), valid.max() + Coord::repeat(1));
    let mut points = Vec::with_capacity(3 * point_box.buffer_size());
    for coord in point_box.coord_iter() {
        for d in 0..3 {
            if d < GRID_DIMENSION {
                points.push(geometry.prob_lo()[d] + coord[d] as f64 * dx[d]);
            } else {
                points.push(0.0);
            }
        }
    }

    let corners = cell_corners::<GRID_DIMENSION>();
    let cell_type = if GRID_DIMENSION == 3 {
        CellType::Hexahedron
    } else {
        CellType::Quad
    };
    let n_cells = valid.buffer_size();
    let mut connectivity = Vec::with_capacity(n_cells * corners.len());
    let mut offsets = Vec::with_capacity(n_cells);
    let mut cell_types = Vec::with_capacity(n_cells);
    let mut offset = 0;
    for cell_coord in valid.coord_iter() {
        for corner in &corners {
            connectivity.push(point_box.coord_to_linear(&(cell_coord + corner)) as u64);
        }
        offset += corners.len() as u64;
        offsets.push(offset);
        cell_types.push(cell_type);
    }

    let values = fab.valid_values();
    let cell_data = values
        .chunks(n_cells)
        .enumerate()
        .map(|(c, chunk)| {
            let name = if fab.n_comp() == 1 {
                "phi".to_string()
            } else {
                format!("phi_{c}")
            };
            Attribute::DataArray(DataArray {
                name,
                elem: ElementType::Scalars {
                    num_comp: 1,
                    lookup_table: None,
                },
                data: IOBuffer::F64(chunk.to_vec()),
            })
        })
        .collect();

    Vtk {
        version: Version::Auto,
        title: format!("phi at time {time}"),
        byte_order: ByteOrder::LittleEndian,
        file_path: None,
        data: DataSet::inline(UnstructuredGridPiece {
            points: IOBuffer::F64(points),
            cells: Cells {
                cell_verts: VertexNumbers::XML {
                    connectivity,
                    offsets,
                },
                types: cell_types,
            },
            data: Attributes {
                point: vec![],
                cell: cell_data,
            },
        }),
    }
}
