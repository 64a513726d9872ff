use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

use crate::camera::Camera2d;
use crate::render::Quad;
use crate::resource::XmlNode;

/// Scene layout as authored in XML.
///
/// ```xml
/// <scene>
///     <object>
///         <name>player</name>
///         <type>quad</type>
///         <position>10 20</position>
///         <size>32 32</size>
///         <color>255 128 0</color>
///     </object>
/// </scene>
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SceneDescriptor {
    pub objects: Vec<SceneObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Quad,
    Camera,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    #[serde(default)]
    pub position: Vec2,
    #[serde(default = "default_size")]
    pub size: Vec2,
    #[serde(default = "default_color")]
    pub color: Vec4,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(default = "default_zoom")]
    pub zoom: f32,
}

fn default_size() -> Vec2 {
    Vec2::splat(32.0)
}

fn default_color() -> Vec4 {
    Vec4::ONE
}

fn default_zoom() -> f32 {
    1.0
}

impl SceneObject {
    pub fn to_quad(&self) -> Quad {
        Quad {
            position: self.position,
            size: self.size,
            color: self.color,
            texture: self.texture.clone(),
        }
    }
}

impl SceneDescriptor {
    pub fn parse(xml: &str) -> Result<Self> {
        Self::from_xml(&XmlNode::parse(xml)?)
    }

    pub fn from_xml(root: &XmlNode) -> Result<Self> {
        if root.name != "scene" {
            bail!("expected <scene> root, found <{}>", root.name);
        }

        let objects = root
            .children_named("object")
            .enumerate()
            .map(|(index, node)| {
                parse_object(node).with_context(|| format!("invalid object #{index}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { objects })
    }

    pub fn quads(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects
            .iter()
            .filter(|object| object.kind == ObjectKind::Quad)
    }

    pub fn find(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|object| object.name == name)
    }

    /// Camera described by the first `camera` object, or a default view over
    /// `viewport`.
    pub fn camera(&self, viewport: Vec2) -> Camera2d {
        let mut camera = Camera2d::new(viewport);
        if let Some(object) = self
            .objects
            .iter()
            .find(|object| object.kind == ObjectKind::Camera)
        {
            camera.position = object.position;
            camera.set_zoom(object.zoom);
        }
        camera
    }
}

fn parse_object(node: &XmlNode) -> Result<SceneObject> {
    let name = required_text(node, "name")?;
    let kind = match optional_text(node, "type").unwrap_or("quad") {
        "quad" => ObjectKind::Quad,
        "camera" => ObjectKind::Camera,
        other => bail!("unknown object type `{other}`"),
    };
    Ok(SceneObject {
        name: name.to_string(),
        kind,
        position: parse_vec2(optional_text(node, "position"), Vec2::ZERO)?,
        size: parse_vec2(optional_text(node, "size"), default_size())?,
        color: parse_color(optional_text(node, "color"), default_color())?,
        texture: optional_text(node, "texture").map(str::to_string),
        zoom: parse_f32(optional_text(node, "zoom"), default_zoom())?,
    })
}

fn required_text<'a>(node: &'a XmlNode, tag: &str) -> Result<&'a str> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text<'a>(node: &'a XmlNode, tag: &str) -> Option<&'a str> {
    node.child_text(tag).filter(|text| !text.is_empty())
}

fn components(value: &str, kind: &str) -> Result<Vec<f32>> {
    value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|err| anyhow!("{kind} component `{component}`: {err}"))
        })
        .collect()
}

fn parse_vec2(value: Option<&str>, default: Vec2) -> Result<Vec2> {
    let Some(value) = value else {
        return Ok(default);
    };
    match components(value, "vector")?[..] {
        [x, y] => Ok(Vec2::new(x, y)),
        _ => bail!("vector `{value}` needs two components"),
    }
}

/// `r g b [a]` in 0..=255.
fn parse_color(value: Option<&str>, default: Vec4) -> Result<Vec4> {
    let Some(value) = value else {
        return Ok(default);
    };
    let rgba = match components(value, "color")?[..] {
        [r, g, b] => Vec4::new(r, g, b, 255.0),
        [r, g, b, a] => Vec4::new(r, g, b, a),
        _ => bail!("color `{value}` needs three or four components"),
    };
    Ok(rgba / 255.0)
}

fn parse_f32(value: Option<&str>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <scene>
        <object>
            <name>view</name>
            <type>camera</type>
            <position>160 120</position>
            <zoom>2</zoom>
        </object>
        <object>
            <name>player</name>
            <type>quad</type>
            <position>10 20</position>
            <size>16 8</size>
            <color>255 128 0</color>
            <texture>ship.png</texture>
        </object>
        <object>
            <name>wall</name>
        </object>
    </scene>
    "#;

    #[test]
    fn parses_objects_with_defaults() {
        let scene = SceneDescriptor::parse(SAMPLE).unwrap();
        assert_eq!(scene.objects.len(), 3);
        assert_eq!(scene.quads().count(), 2);

        let player = scene.find("player").unwrap();
        assert_eq!(player.position, Vec2::new(10.0, 20.0));
        assert_eq!(player.size, Vec2::new(16.0, 8.0));
        assert_eq!(player.color, Vec4::new(1.0, 128.0 / 255.0, 0.0, 1.0));
        assert_eq!(player.to_quad().texture.as_deref(), Some("ship.png"));

        let wall = scene.find("wall").unwrap();
        assert_eq!(wall.kind, ObjectKind::Quad);
        assert_eq!(wall.size, Vec2::splat(32.0));
        assert_eq!(wall.color, Vec4::ONE);
    }

    #[test]
    fn camera_object_configures_view() {
        let scene = SceneDescriptor::parse(SAMPLE).unwrap();
        let camera = scene.camera(Vec2::new(320.0, 240.0));
        assert_eq!(camera.position, Vec2::new(160.0, 120.0));
        assert_eq!(camera.zoom, 2.0);

        let empty = SceneDescriptor::parse("<scene/>").unwrap();
        assert_eq!(empty.camera(Vec2::new(320.0, 240.0)), Camera2d::new(Vec2::new(320.0, 240.0)));
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><type>quad</type></object></scene>";
        let err = SceneDescriptor::parse(bad).unwrap_err();
        assert!(format!("{err:#}").contains("<name> tag is missing"));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(SceneDescriptor::parse("<level/>").is_err());
        assert!(SceneDescriptor::parse(
            "<scene><object><name>a</name><type>light</type></object></scene>"
        )
        .is_err());
        assert!(SceneDescriptor::parse(
            "<scene><object><name>a</name><position>1 x</position></object></scene>"
        )
        .is_err());
        assert!(SceneDescriptor::parse(
            "<scene><object><name>a</name><color>1 2</color></object></scene>"
        )
        .is_err());
    }
}
