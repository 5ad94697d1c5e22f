//! Standard material palette.
//!
//! Named colour presets every material module can define on demand. Palette
//! materials are managed: they persist without external references until the
//! module is torn down.

use glam::DVec3;

use crate::resources::material::Material;

/// Name of the material used when nothing else is specified.
pub const DEFAULT_MATERIAL: &str = "default";
/// Name of the material used to highlight selected objects.
pub const DEFAULT_SELECTED_MATERIAL: &str = "default_selected";

/// One palette entry. Emission is black and alpha is 1 for all of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardMaterial {
    pub name: &'static str,
    pub ambient: DVec3,
    pub diffuse: DVec3,
    pub specular: DVec3,
    pub shininess: f64,
}

const fn grey(value: f64) -> DVec3 {
    DVec3::new(value, value, value)
}

const fn flat(
    name: &'static str,
    colour: DVec3,
    specular: f64,
    shininess: f64,
) -> StandardMaterial {
    StandardMaterial {
        name,
        ambient: colour,
        diffuse: colour,
        specular: grey(specular),
        shininess,
    }
}

pub const STANDARD_MATERIALS: [StandardMaterial; 18] = [
    flat("black", DVec3::ZERO, 0.3, 0.2),
    flat("blue", DVec3::new(0.0, 0.0, 1.0), 0.1, 0.2),
    StandardMaterial {
        name: "bone",
        ambient: DVec3::new(0.7, 0.7, 0.6),
        diffuse: DVec3::new(0.9, 0.9, 0.7),
        specular: grey(0.1),
        shininess: 0.2,
    },
    flat("brown", DVec3::new(0.5, 0.25, 0.0), 0.1, 0.2),
    flat("cyan", DVec3::new(0.0, 1.0, 1.0), 0.1, 0.2),
    StandardMaterial {
        name: "gold",
        ambient: DVec3::new(1.0, 0.4, 0.0),
        diffuse: DVec3::new(1.0, 0.7, 0.0),
        specular: grey(0.5),
        shininess: 0.3,
    },
    flat("green", DVec3::new(0.0, 1.0, 0.0), 0.1, 0.2),
    flat("grey25", grey(0.25), 0.1, 0.2),
    flat("grey50", grey(0.5), 0.1, 0.2),
    flat("grey75", grey(0.75), 0.1, 0.2),
    flat("magenta", DVec3::new(1.0, 0.0, 1.0), 0.1, 0.2),
    StandardMaterial {
        name: "muscle",
        ambient: DVec3::new(0.4, 0.14, 0.11),
        diffuse: DVec3::new(0.5, 0.12, 0.1),
        specular: DVec3::new(0.3, 0.5, 0.5),
        shininess: 0.2,
    },
    flat("orange", DVec3::new(1.0, 0.5, 0.0), 0.1, 0.2),
    flat("red", DVec3::new(1.0, 0.0, 0.0), 0.1, 0.2),
    StandardMaterial {
        name: "silver",
        ambient: grey(0.4),
        diffuse: grey(0.7),
        specular: grey(0.5),
        shininess: 0.3,
    },
    StandardMaterial {
        name: "tissue",
        ambient: DVec3::new(0.9, 0.7, 0.5),
        diffuse: DVec3::new(0.9, 0.7, 0.5),
        specular: DVec3::new(0.2, 0.2, 0.3),
        shininess: 0.2,
    },
    flat("white", DVec3::ONE, 0.0, 0.0),
    flat("yellow", DVec3::new(1.0, 1.0, 0.0), 0.1, 0.2),
];

/// Selection highlight colour.
pub const SELECTED_COLOUR: DVec3 = DVec3::new(1.0, 0.2, 0.0);

impl StandardMaterial {
    #[must_use]
    pub fn find(name: &str) -> Option<&'static Self> {
        STANDARD_MATERIALS.iter().find(|entry| entry.name == name)
    }

    /// Builds a fixed-function material with these colours.
    pub fn build(&self) -> crate::errors::Result<Material> {
        let mut material = Material::new();
        material.set_ambient(self.ambient);
        material.set_diffuse(self.diffuse);
        material.set_emission(DVec3::ZERO);
        material.set_specular(self.specular);
        material.set_shininess(self.shininess)?;
        material.set_alpha(1.0)?;
        Ok(material)
    }
}

/// The `default_selected` material: red-orange, no specular highlight.
#[must_use]
pub fn selected_material() -> Material {
    let mut material = Material::new();
    material.set_ambient(SELECTED_COLOUR);
    material.set_diffuse(SELECTED_COLOUR);
    material
}
