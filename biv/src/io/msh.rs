//! gmsh `.msh` ASCII codec.
//!
//! Reads format 2.2 and 4.1 files and keeps what [`Mesh`] models: nodes,
//! linear or quadratic triangles and tetrahedra (corner nodes only), their
//! physical tags and the `$PhysicalNames` table. Writes the canonical 2.2
//! form, so a file written here and read back re-renders byte for byte.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, instrument};

use crate::core::markers::MarkerRegistry;
use crate::core::mesh::{Cell, Facet, Mesh};

const TRIANGLE: u32 = 2;
const TETRAHEDRON: u32 = 4;
const TRIANGLE_6: u32 = 9;
const TETRAHEDRON_10: u32 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    V2,
    V4,
}

#[derive(Debug)]
struct Section<'a> {
    name: &'a str,
    /// 1-based line numbers paired with the raw lines between the markers.
    lines: Vec<(usize, &'a str)>,
}

/// Line-by-line reader over one section, skipping blank lines.
struct Cursor<'a, 'b> {
    section: &'b Section<'a>,
    next: usize,
}

impl<'a, 'b> Cursor<'a, 'b> {
    fn new(section: &'b Section<'a>) -> Self {
        Self { section, next: 0 }
    }

    fn line(&mut self) -> Result<(usize, &'a str)> {
        while let Some(&(number, line)) = self.section.lines.get(self.next) {
            self.next += 1;
            if !line.trim().is_empty() {
                return Ok((number, line.trim()));
            }
        }
        Err(anyhow!("unexpected end of ${} section", self.section.name))
    }

    fn fields(&mut self) -> Result<(usize, Vec<&'a str>)> {
        let (number, line) = self.line()?;
        Ok((number, line.split_whitespace().collect()))
    }

    /// Read a line of at least `count` values.
    fn values<T: FromStr>(&mut self, count: usize, what: &str) -> Result<(usize, Vec<T>)> {
        let (number, fields) = self.fields()?;
        if fields.len() < count {
            bail!(
                "line {number}: expected {count} values for {what}, found {}",
                fields.len()
            );
        }
        let values = fields
            .iter()
            .map(|field| parse_value(field, number, what))
            .collect::<Result<Vec<T>>>()?;
        Ok((number, values))
    }
}

fn parse_value<T: FromStr>(field: &str, line: usize, what: &str) -> Result<T> {
    field
        .parse()
        .map_err(|_| anyhow!("line {line}: invalid {what} value {field:?}"))
}

fn split_sections(contents: &str) -> Result<Vec<Section<'_>>> {
    let mut sections = Vec::new();
    let mut current: Option<Section<'_>> = None;
    for (index, raw) in contents.lines().enumerate() {
        let number = index + 1;
        let line = raw.trim();
        if let Some(name) = line.strip_prefix("$End") {
            match current.take() {
                Some(section) if section.name == name => sections.push(section),
                Some(section) => bail!(
                    "line {number}: ${} closes ${} section",
                    line.trim_start_matches('$'),
                    section.name
                ),
                None => bail!("line {number}: {line} without an open section"),
            }
        } else if let Some(name) = line.strip_prefix('$') {
            if let Some(section) = &current {
                bail!("line {number}: ${name} opened inside ${}", section.name);
            }
            current = Some(Section {
                name,
                lines: Vec::new(),
            });
        } else if let Some(section) = current.as_mut() {
            section.lines.push((number, raw));
        }
    }
    if let Some(section) = current {
        bail!("unterminated ${} section", section.name);
    }
    Ok(sections)
}

/// Read and parse a `.msh` file.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_msh(path: &Path) -> Result<Mesh> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mesh = parse_msh(&contents).with_context(|| format!("parse {}", path.display()))?;
    debug!(
        vertices = mesh.vertices.len(),
        cells = mesh.cells.len(),
        facets = mesh.facets.len(),
        markers = mesh.registry.len(),
        "mesh loaded"
    );
    Ok(mesh)
}

pub fn parse_msh(contents: &str) -> Result<Mesh> {
    let sections = split_sections(contents)?;
    let find = |name: &str| sections.iter().find(|section| section.name == name);

    let format = find("MeshFormat").ok_or_else(|| anyhow!("missing $MeshFormat section"))?;
    let version = parse_format(format)?;

    let mut mesh = Mesh::default();
    if let Some(names) = find("PhysicalNames") {
        mesh.registry = parse_physical_names(names)?;
    }

    let nodes = find("Nodes").ok_or_else(|| anyhow!("missing $Nodes section"))?;
    let elements = find("Elements").ok_or_else(|| anyhow!("missing $Elements section"))?;
    let node_index = match version {
        Version::V2 => parse_nodes_v2(nodes, &mut mesh.vertices)?,
        Version::V4 => parse_nodes_v4(nodes, &mut mesh.vertices)?,
    };
    match version {
        Version::V2 => parse_elements_v2(elements, &node_index, &mut mesh)?,
        Version::V4 => {
            let entities = match find("Entities") {
                Some(section) => parse_entities(section)?,
                None => HashMap::new(),
            };
            parse_elements_v4(elements, &node_index, &entities, &mut mesh)?;
        }
    }
    Ok(mesh)
}

fn parse_format(section: &Section<'_>) -> Result<Version> {
    let (number, fields) = Cursor::new(section).fields()?;
    let [version, file_type, ..] = fields.as_slice() else {
        bail!("line {number}: malformed $MeshFormat");
    };
    if *file_type != "0" {
        bail!("line {number}: binary .msh files are not supported");
    }
    match *version {
        v if v.starts_with("2.") => Ok(Version::V2),
        "4.1" => Ok(Version::V4),
        other => bail!("line {number}: unsupported .msh version {other}"),
    }
}

fn parse_physical_names(section: &Section<'_>) -> Result<MarkerRegistry> {
    let mut cursor = Cursor::new(section);
    let (_, count) = cursor.values::<usize>(1, "physical name count")?;
    let mut registry = MarkerRegistry::new();
    for _ in 0..count[0] {
        let (number, line) = cursor.line()?;
        let parsed = line.split_once(char::is_whitespace).and_then(|(dim, rest)| {
            let (tag, name) = rest.trim_start().split_once(char::is_whitespace)?;
            Some((dim, tag, name.trim().trim_matches('"')))
        });
        let Some((dim, tag, name)) = parsed else {
            bail!("line {number}: malformed physical name {line:?}");
        };
        registry.insert(
            name,
            parse_value(tag, number, "physical tag")?,
            parse_value(dim, number, "physical dimension")?,
        );
    }
    Ok(registry)
}

fn parse_nodes_v2(section: &Section<'_>, vertices: &mut Vec<[f64; 3]>) -> Result<HashMap<usize, usize>> {
    let mut cursor = Cursor::new(section);
    let (_, count) = cursor.values::<usize>(1, "node count")?;
    let mut index = HashMap::with_capacity(count[0]);
    for _ in 0..count[0] {
        let (number, fields) = cursor.fields()?;
        if fields.len() < 4 {
            bail!("line {number}: expected node id and 3 coordinates");
        }
        let id: usize = parse_value(fields[0], number, "node id")?;
        let xyz = [
            parse_value(fields[1], number, "coordinate")?,
            parse_value(fields[2], number, "coordinate")?,
            parse_value(fields[3], number, "coordinate")?,
        ];
        index.insert(id, vertices.len());
        vertices.push(xyz);
    }
    Ok(index)
}

fn parse_nodes_v4(section: &Section<'_>, vertices: &mut Vec<[f64; 3]>) -> Result<HashMap<usize, usize>> {
    let mut cursor = Cursor::new(section);
    let (_, header) = cursor.values::<usize>(4, "node header")?;
    let (blocks, total) = (header[0], header[1]);
    let mut index = HashMap::with_capacity(total);
    for _ in 0..blocks {
        let (_, block) = cursor.values::<usize>(4, "node block header")?;
        let in_block = block[3];
        let mut tags = Vec::with_capacity(in_block);
        while tags.len() < in_block {
            let (number, fields) = cursor.fields()?;
            for field in fields {
                tags.push(parse_value::<usize>(field, number, "node tag")?);
            }
        }
        for tag in tags {
            let (_, xyz) = cursor.values::<f64>(3, "node coordinates")?;
            index.insert(tag, vertices.len());
            vertices.push([xyz[0], xyz[1], xyz[2]]);
        }
    }
    if vertices.len() != total {
        bail!("$Nodes declares {total} nodes but lists {}", vertices.len());
    }
    Ok(index)
}

/// Physical tag of each `(dim, entity)`, from `$Entities`.
fn parse_entities(section: &Section<'_>) -> Result<HashMap<(u8, i32), i32>> {
    let mut cursor = Cursor::new(section);
    let (_, counts) = cursor.values::<usize>(4, "entity counts")?;
    let mut physical = HashMap::new();
    for (dim, &count) in counts.iter().take(4).enumerate() {
        // Points carry a position, higher entities a bounding box.
        let count_at = if dim == 0 { 4 } else { 7 };
        for _ in 0..count {
            let (number, fields) = cursor.fields()?;
            if fields.len() <= count_at {
                bail!("line {number}: truncated entity record");
            }
            let tag: i32 = parse_value(fields[0], number, "entity tag")?;
            let physical_count: usize = parse_value(fields[count_at], number, "physical count")?;
            if physical_count > 0 {
                let first = fields
                    .get(count_at + 1)
                    .ok_or_else(|| anyhow!("line {number}: missing physical tag"))?;
                physical.insert((dim as u8, tag), parse_value(first, number, "physical tag")?);
            }
        }
    }
    Ok(physical)
}

fn corner_count(element_type: u32) -> Option<(usize, usize)> {
    // (corners kept, nodes listed)
    match element_type {
        TRIANGLE => Some((3, 3)),
        TRIANGLE_6 => Some((3, 6)),
        TETRAHEDRON => Some((4, 4)),
        TETRAHEDRON_10 => Some((4, 10)),
        _ => None,
    }
}

fn push_element(
    mesh: &mut Mesh,
    element_type: u32,
    tag: i32,
    node_tags: &[&str],
    node_index: &HashMap<usize, usize>,
    number: usize,
) -> Result<()> {
    let Some((corners, listed)) = corner_count(element_type) else {
        return Ok(());
    };
    if node_tags.len() < listed {
        bail!(
            "line {number}: element type {element_type} needs {listed} nodes, found {}",
            node_tags.len()
        );
    }
    let mut vertices = [0usize; 4];
    for (slot, field) in vertices.iter_mut().zip(&node_tags[..corners]) {
        let node: usize = parse_value(field, number, "element node")?;
        *slot = *node_index
            .get(&node)
            .ok_or_else(|| anyhow!("line {number}: element references unknown node {node}"))?;
    }
    if corners == 3 {
        mesh.facets.push(Facet {
            vertices: [vertices[0], vertices[1], vertices[2]],
            tag,
        });
    } else {
        mesh.cells.push(Cell { vertices, tag });
    }
    Ok(())
}

fn parse_elements_v2(
    section: &Section<'_>,
    node_index: &HashMap<usize, usize>,
    mesh: &mut Mesh,
) -> Result<()> {
    let mut cursor = Cursor::new(section);
    let (_, count) = cursor.values::<usize>(1, "element count")?;
    for _ in 0..count[0] {
        let (number, fields) = cursor.fields()?;
        if fields.len() < 3 {
            bail!("line {number}: truncated element record");
        }
        let element_type: u32 = parse_value(fields[1], number, "element type")?;
        let tag_count: usize = parse_value(fields[2], number, "tag count")?;
        if fields.len() < 3 + tag_count {
            bail!("line {number}: element lists {tag_count} tags but has fewer fields");
        }
        let tag = match tag_count {
            0 => 0,
            _ => parse_value(fields[3], number, "physical tag")?,
        };
        push_element(
            mesh,
            element_type,
            tag,
            &fields[3 + tag_count..],
            node_index,
            number,
        )?;
    }
    Ok(())
}

fn parse_elements_v4(
    section: &Section<'_>,
    node_index: &HashMap<usize, usize>,
    entities: &HashMap<(u8, i32), i32>,
    mesh: &mut Mesh,
) -> Result<()> {
    let mut cursor = Cursor::new(section);
    let (_, header) = cursor.values::<usize>(4, "element header")?;
    for _ in 0..header[0] {
        let (number, block) = cursor.fields()?;
        if block.len() < 4 {
            bail!("line {number}: truncated element block header");
        }
        let dim: u8 = parse_value(block[0], number, "entity dimension")?;
        let entity: i32 = parse_value(block[1], number, "entity tag")?;
        let element_type: u32 = parse_value(block[2], number, "element type")?;
        let count: usize = parse_value(block[3], number, "element count")?;
        let tag = entities.get(&(dim, entity)).copied().unwrap_or(0);
        for _ in 0..count {
            let (number, fields) = cursor.fields()?;
            let node_tags = fields.get(1..).unwrap_or_default();
            push_element(mesh, element_type, tag, node_tags, node_index, number)?;
        }
    }
    Ok(())
}

/// Render `mesh` in canonical gmsh 2.2 ASCII form.
///
/// Nodes are numbered from 1 in vertex order, facets precede cells, and the
/// elementary tag repeats the physical tag.
pub fn render_msh(mesh: &Mesh) -> String {
    let mut out = String::new();
    out.push_str("$MeshFormat\n2.2 0 8\n$EndMeshFormat\n");

    let mut names: Vec<(u8, i32, &str)> = mesh
        .registry
        .iter()
        .map(|(name, marker)| (marker.dim, marker.tag, name))
        .collect();
    names.sort_unstable();
    out.push_str("$PhysicalNames\n");
    out.push_str(&format!("{}\n", names.len()));
    for (dim, tag, name) in names {
        out.push_str(&format!("{dim} {tag} \"{name}\"\n"));
    }
    out.push_str("$EndPhysicalNames\n");

    out.push_str("$Nodes\n");
    out.push_str(&format!("{}\n", mesh.vertices.len()));
    for (index, [x, y, z]) in mesh.vertices.iter().enumerate() {
        out.push_str(&format!("{} {x} {y} {z}\n", index + 1));
    }
    out.push_str("$EndNodes\n");

    out.push_str("$Elements\n");
    out.push_str(&format!("{}\n", mesh.facets.len() + mesh.cells.len()));
    let mut id = 0usize;
    for facet in &mesh.facets {
        id += 1;
        let [a, b, c] = facet.vertices.map(|v| v + 1);
        out.push_str(&format!("{id} {TRIANGLE} 2 {0} {0} {a} {b} {c}\n", facet.tag));
    }
    for cell in &mesh.cells {
        id += 1;
        let [a, b, c, d] = cell.vertices.map(|v| v + 1);
        out.push_str(&format!(
            "{id} {TETRAHEDRON} 2 {0} {0} {a} {b} {c} {d}\n",
            cell.tag
        ));
    }
    out.push_str("$EndElements\n");
    out
}

pub fn write_msh(path: &Path, mesh: &Mesh) -> Result<()> {
    fs::write(path, render_msh(mesh)).with_context(|| format!("write {}", path.display()))
}
