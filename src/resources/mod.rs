//! Asset loading.
//!
//! Assets are addressed by a path relative to the asset root: `./assets/` next to
//! the binary (overridable with `FLOW_AR_ASSET_DIR`) or `<origin>/assets/` on the
//! web. glTF files are turned into scene [`Node`] trees: geometry and the
//! metal/roughness factors are kept, textures and animations are not.

use std::rc::Rc;

use anyhow::Context as _;
use futures::{FutureExt, future::LocalBoxFuture};

use crate::data_structures::{
    geometry::{Geometry, Vertex},
    instance::Instance,
    material::Material,
    scene_graph::Node,
};

/// Loads a model by asset path. Scenes take one of these so hosts (and tests) can
/// decide where models come from.
pub type ModelLoader = Rc<dyn Fn(&str) -> LocalBoxFuture<'static, anyhow::Result<Node>>>;

/// The default [`ModelLoader`], reading glTF files from the asset root.
pub fn gltf_loader() -> ModelLoader {
    Rc::new(|path: &str| {
        let path = path.to_owned();
        async move { load_model_gltf(&path).await }.boxed_local()
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl Progress {
    pub fn percent(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| self.loaded as f64 / total as f64 * 100.0)
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no global window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("cannot read the page origin: {:?}", e))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

#[cfg(not(target_arch = "wasm32"))]
fn asset_root() -> std::path::PathBuf {
    std::env::var_os("FLOW_AR_ASSET_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::Path::new("./").join("assets"))
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    load_binary_with_progress(file_name, |_| ()).await
}

/// Size of the reads between two progress reports.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Reads an asset and reports the running byte count after every chunk.
pub async fn load_binary_with_progress(
    file_name: &str,
    mut on_progress: impl FnMut(Progress),
) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        use futures::StreamExt;

        let url = format_url(file_name)?;
        let response = reqwest::get(url).await?.error_for_status()?;
        let total = response.content_length();
        let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            data.extend_from_slice(&chunk?);
            on_progress(Progress {
                loaded: data.len() as u64,
                total,
            });
        }
        data
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = asset_root().join(file_name);
        let file = std::fs::File::open(&path).with_context(|| format!("cannot read {}", path.display()))?;
        let total = file.metadata().ok().map(|meta| meta.len());
        read_with_progress(std::io::BufReader::with_capacity(CHUNK_SIZE, file), total, &mut on_progress)
            .with_context(|| format!("cannot read {}", path.display()))?
    };

    Ok(data)
}

#[cfg(not(target_arch = "wasm32"))]
fn read_with_progress(
    mut reader: impl std::io::Read,
    total: Option<u64>,
    on_progress: &mut impl FnMut(Progress),
) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        data.extend_from_slice(&chunk[..read]);
        on_progress(Progress {
            loaded: data.len() as u64,
            total,
        });
    }
    Ok(data)
}

fn parent_dir(file_name: &str) -> &str {
    file_name.rfind('/').map_or("", |idx| &file_name[..=idx])
}

pub async fn load_model_gltf(file_name: &str) -> anyhow::Result<Node> {
    let bytes = load_binary_with_progress(file_name, |progress| {
        if let Some(percent) = progress.percent() {
            log::info!("{}: {:.0}% loaded", file_name, percent);
        }
    })
    .await?;
    let gltf = gltf::Gltf::from_slice(&bytes)
        .with_context(|| format!("{} is not a valid glTF file", file_name))?;

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{} references a missing binary chunk", file_name))?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                let data = gltf::buffer::Data::from_source(buffer.source(), None)?;
                buffer_data.push(data.0);
            }
            gltf::buffer::Source::Uri(uri) => {
                let path = format!("{}{}", parent_dir(file_name), uri);
                buffer_data.push(load_binary(&path).await?);
            }
        }
    }

    let materials: Vec<Material> = gltf.materials().map(to_material).collect();

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{} contains no scene", file_name))?;
    let mut root = Node::group(file_name);
    for node in scene.nodes() {
        root.children.push(to_node(node, &buffer_data, &materials));
    }
    if root.mesh_count() == 0 {
        log::warn!("{} has no triangle meshes", file_name);
    }
    Ok(root)
}

fn to_material(material: gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();
    let converted = Material::standard_linear([r, g, b], pbr.metallic_factor(), pbr.roughness_factor());
    if material.double_sided() {
        converted.double_sided()
    } else {
        converted
    }
}

fn to_node(node: gltf::scene::Node, buffers: &[Vec<u8>], materials: &[Material]) -> Node {
    let (translation, rotation, scale) = node.transform().decomposed();
    let mut converted = Node::group(node.name().unwrap_or("node")).with_transform(Instance {
        position: translation.into(),
        rotation: rotation.into(),
        scale: scale.into(),
    });

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            let Some(geometry) = read_primitive(&primitive, buffers) else {
                continue;
            };
            let material = primitive
                .material()
                .index()
                .and_then(|idx| materials.get(idx))
                .copied()
                .unwrap_or_default();
            converted
                .children
                .push(Node::mesh(mesh.name().unwrap_or("mesh"), geometry, material));
        }
    }
    for child in node.children() {
        converted.children.push(to_node(child, buffers, materials));
    }
    converted
}

fn read_primitive(primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> Option<Geometry> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("skipping primitive with unsupported mode {:?}", primitive.mode());
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    if indices.iter().any(|&i| i as usize >= positions.len()) {
        log::warn!("skipping primitive with out of range indices");
        return None;
    }

    match reader.read_normals() {
        Some(normals) => {
            let vertices = positions
                .into_iter()
                .zip(normals)
                .map(|(position, normal)| Vertex { position, normal })
                .collect();
            Some(Geometry::new(vertices, indices))
        }
        None => {
            let triangles: Vec<[cgmath::Vector3<f32>; 3]> = indices
                .chunks_exact(3)
                .map(|t| [0, 1, 2].map(|k| positions[t[k] as usize].into()))
                .collect();
            Some(Geometry::from_triangles(&triangles))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_buffers_resolve_next_to_the_model() {
        assert_eq!(parent_dir("models2/scene.gltf"), "models2/");
        assert_eq!(parent_dir("scene.gltf"), "");
    }

    #[test]
    fn large_reads_report_progress_per_chunk() {
        let asset = vec![7u8; 300_000];
        let mut reports = Vec::new();
        let data = read_with_progress(
            std::io::Cursor::new(&asset),
            Some(asset.len() as u64),
            &mut |progress: Progress| reports.push(progress),
        )
        .expect("in-memory read");

        assert_eq!(data, asset);
        assert_eq!(reports.len(), asset.len().div_ceil(CHUNK_SIZE));
        assert!(reports.windows(2).all(|w| w[0].loaded < w[1].loaded));
        assert!(reports[0].percent().is_some_and(|p| p < 25.0));
        assert_eq!(reports.last().and_then(Progress::percent), Some(100.0));
    }

    #[test]
    fn progress_percentage() {
        let progress = Progress {
            loaded: 50,
            total: Some(200),
        };
        assert_eq!(progress.percent(), Some(25.0));
        assert_eq!(
            Progress {
                loaded: 1,
                total: None
            }
            .percent(),
            None
        );
    }
}
