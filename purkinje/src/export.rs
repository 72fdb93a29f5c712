//! Tree serialization.
//!
//! A tree named `<stem>` is stored as four files in one directory:
//!
//! | file                  | content                                   |
//! |-----------------------|-------------------------------------------|
//! | `<stem>_xyz.txt`      | `x y z` per node                          |
//! | `<stem>_lines.txt`    | `parent child` per segment                |
//! | `<stem>_endnodes.txt` | one end node index per line               |
//! | `<stem>.vtu`          | VTK XML unstructured grid of line cells   |
//!
//! Floats use the shortest representation that parses back to the same
//! value, so writing a tree that was read from disk reproduces the file.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::GrowthError;
use crate::tree::PurkinjeTree;

/// VTK cell type id for a two-point line.
const VTK_LINE: u8 = 3;

/// Paths of the four files making up a stored tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFiles {
    pub xyz: PathBuf,
    pub lines: PathBuf,
    pub endnodes: PathBuf,
    pub vtu: PathBuf,
}

impl TreeFiles {
    pub fn new(dir: &Path, stem: &str) -> Self {
        Self {
            xyz: dir.join(format!("{stem}_xyz.txt")),
            lines: dir.join(format!("{stem}_lines.txt")),
            endnodes: dir.join(format!("{stem}_endnodes.txt")),
            vtu: dir.join(format!("{stem}.vtu")),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [&self.vtu, &self.xyz, &self.lines, &self.endnodes]
    }
}

pub fn format_xyz(tree: &PurkinjeTree) -> String {
    let mut out = String::new();
    for [x, y, z] in &tree.xyz {
        let _ = writeln!(out, "{x} {y} {z}");
    }
    out
}

pub fn format_lines(tree: &PurkinjeTree) -> String {
    let mut out = String::new();
    for [parent, child] in &tree.lines {
        let _ = writeln!(out, "{parent} {child}");
    }
    out
}

pub fn format_endnodes(tree: &PurkinjeTree) -> String {
    let mut out = String::new();
    for node in &tree.endnodes {
        let _ = writeln!(out, "{node}");
    }
    out
}

/// Render the tree as an ASCII VTK XML unstructured grid.
pub fn render_vtu(tree: &PurkinjeTree) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\"?>\n");
    out.push_str(
        "<VTKFile type=\"UnstructuredGrid\" version=\"0.1\" byte_order=\"LittleEndian\">\n",
    );
    out.push_str("  <UnstructuredGrid>\n");
    let _ = writeln!(
        out,
        "    <Piece NumberOfPoints=\"{}\" NumberOfCells=\"{}\">",
        tree.xyz.len(),
        tree.lines.len()
    );

    out.push_str("      <Points>\n");
    out.push_str(
        "        <DataArray type=\"Float64\" NumberOfComponents=\"3\" format=\"ascii\">\n",
    );
    for [x, y, z] in &tree.xyz {
        let _ = writeln!(out, "          {x} {y} {z}");
    }
    out.push_str("        </DataArray>\n");
    out.push_str("      </Points>\n");

    out.push_str("      <Cells>\n");
    out.push_str("        <DataArray type=\"Int64\" Name=\"connectivity\" format=\"ascii\">\n");
    for [parent, child] in &tree.lines {
        let _ = writeln!(out, "          {parent} {child}");
    }
    out.push_str("        </DataArray>\n");
    out.push_str("        <DataArray type=\"Int64\" Name=\"offsets\" format=\"ascii\">\n");
    for index in 0..tree.lines.len() {
        let _ = writeln!(out, "          {}", 2 * (index + 1));
    }
    out.push_str("        </DataArray>\n");
    out.push_str("        <DataArray type=\"UInt8\" Name=\"types\" format=\"ascii\">\n");
    for _ in &tree.lines {
        let _ = writeln!(out, "          {VTK_LINE}");
    }
    out.push_str("        </DataArray>\n");
    out.push_str("      </Cells>\n");

    out.push_str("    </Piece>\n");
    out.push_str("  </UnstructuredGrid>\n");
    out.push_str("</VTKFile>\n");
    out
}

/// Write all four tree files, creating nothing but the files themselves.
pub fn write_tree(dir: &Path, stem: &str, tree: &PurkinjeTree) -> Result<TreeFiles, GrowthError> {
    let files = TreeFiles::new(dir, stem);
    write_file(&files.xyz, &format_xyz(tree))?;
    write_file(&files.lines, &format_lines(tree))?;
    write_file(&files.endnodes, &format_endnodes(tree))?;
    write_file(&files.vtu, &render_vtu(tree))?;
    Ok(files)
}

/// Read a tree back from its text files (the `.vtu` is not read).
///
/// Coordinates may be separated by whitespace or commas.
pub fn read_tree(dir: &Path, stem: &str) -> Result<PurkinjeTree, GrowthError> {
    let files = TreeFiles::new(dir, stem);
    let xyz = parse_rows::<f64, 3>(&files.xyz)?;
    let lines = parse_rows::<usize, 2>(&files.lines)?;
    let endnodes = parse_rows::<usize, 1>(&files.endnodes)?
        .into_iter()
        .map(|[node]| node)
        .collect();
    Ok(PurkinjeTree {
        xyz,
        lines,
        endnodes,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), GrowthError> {
    fs::write(path, contents).map_err(|err| GrowthError::io(path, err))
}

fn parse_rows<T, const N: usize>(path: &Path) -> Result<Vec<[T; N]>, GrowthError>
where
    T: std::str::FromStr + Copy + Default,
    T::Err: std::fmt::Display,
{
    let contents = fs::read_to_string(path).map_err(|err| GrowthError::io(path, err))?;
    let mut rows = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parse_error = |message: String| GrowthError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            message,
        };
        let fields: Vec<&str> = trimmed
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|field| !field.is_empty())
            .collect();
        if fields.len() != N {
            return Err(parse_error(format!(
                "expected {N} values, found {}",
                fields.len()
            )));
        }
        let mut row = [T::default(); N];
        for (slot, field) in row.iter_mut().zip(&fields) {
            *slot = field
                .parse()
                .map_err(|err| parse_error(format!("invalid value {field:?}: {err}")))?;
        }
        rows.push(row);
    }
    Ok(rows)
}
