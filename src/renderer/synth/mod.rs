//! Shader Source Synthesizer
//!
//! Expands a [`FeatureKey`] into vertex and fragment program text for one [`Dialect`].
//!
//! Each stage is an ordered table of [`Region`]s. A region inspects the decoded
//! [`ShaderPlan`] to decide whether it applies, then appends its text through a
//! [`DialectWriter`]. The dialect is resolved once, at the top of [`synthesize`], by
//! picking the writer; regions never test the dialect themselves.
//!
//! Region order is fixed because later regions read declarations made by earlier
//! ones:
//!
//! | Stage | Regions |
//! |-------|---------|
//! | Gouraud vertex | header, lighting, texture coordinates, end |
//! | Gouraud fragment | header, eye space, depth peel, lighting, colour sample, combine, end |
//! | Per-pixel vertex | header, eye vertex, texture coordinates, tangent space / eye normal, clip position, end |
//! | Per-pixel fragment | header, eye space, depth peel, colour sample, second sample, surface normal, lighting, combine, colour lookup, component lookup, lit volume, depth write, end |
//!
//! Synthesis is pure: no backend calls are made and the same inputs always produce
//! the same text.

mod assembly;
mod glsl;
pub mod plan;

use crate::errors::{Result, ShaderError};
use crate::renderer::dialect::{Dialect, VendorHints};
use crate::resources::feature_key::FeatureKey;

pub use plan::{
    ColourLookup, ColourTexture, LayerRole, Lighting, LitVolume, LookupOutput, SecondTexture,
    ShaderPlan, VolumeNormal,
};

/// Program text produced for one permutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedSource {
    pub vertex: String,
    pub fragment: String,
    /// Synthesized permutations never need a geometry stage.
    pub geometry: Option<String>,
}

/// Dialect-specific text for every region.
///
/// Implementations only append text; whether a region runs at all is decided by the
/// region table.
pub(crate) trait DialectWriter {
    fn dialect(&self) -> Dialect;

    // Gouraud vertex
    fn gouraud_vertex_header(&self, plan: &ShaderPlan, out: &mut String);
    fn gouraud_vertex_lighting(&self, plan: &ShaderPlan, out: &mut String);
    fn gouraud_vertex_end(&self, plan: &ShaderPlan, out: &mut String);

    // Gouraud fragment
    fn gouraud_fragment_header(&self, plan: &ShaderPlan, out: &mut String);
    fn gouraud_fragment_eye_space(&self, plan: &ShaderPlan, out: &mut String);
    fn gouraud_fragment_lighting(&self, plan: &ShaderPlan, out: &mut String);
    fn gouraud_colour_sample(&self, plan: &ShaderPlan, out: &mut String);
    fn gouraud_combine(&self, plan: &ShaderPlan, out: &mut String);
    fn gouraud_fragment_end(&self, plan: &ShaderPlan, out: &mut String);

    // Per-pixel vertex
    fn per_pixel_vertex_header(&self, plan: &ShaderPlan, out: &mut String);
    fn per_pixel_eye_vertex(&self, plan: &ShaderPlan, out: &mut String);
    fn tangent_space(&self, plan: &ShaderPlan, out: &mut String);
    fn eye_normal(&self, plan: &ShaderPlan, out: &mut String);
    fn clip_position(&self, plan: &ShaderPlan, out: &mut String);
    fn per_pixel_vertex_end(&self, plan: &ShaderPlan, out: &mut String);

    // Per-pixel fragment
    fn per_pixel_fragment_header(&self, plan: &ShaderPlan, out: &mut String);
    fn per_pixel_eye_space(&self, plan: &ShaderPlan, out: &mut String);
    fn per_pixel_colour_sample(&self, plan: &ShaderPlan, out: &mut String);
    fn second_sample(&self, plan: &ShaderPlan, out: &mut String);
    fn surface_normal(&self, plan: &ShaderPlan, out: &mut String);
    fn per_pixel_lighting(&self, plan: &ShaderPlan, out: &mut String);
    fn per_pixel_combine(&self, plan: &ShaderPlan, out: &mut String);
    fn colour_lookup(&self, plan: &ShaderPlan, out: &mut String);
    fn component_lookup(&self, plan: &ShaderPlan, out: &mut String);
    fn lit_volume(&self, plan: &ShaderPlan, out: &mut String);
    fn depth_write(&self, plan: &ShaderPlan, out: &mut String);
    fn per_pixel_fragment_end(&self, plan: &ShaderPlan, out: &mut String);

    // Shared
    fn texture_coordinates(&self, plan: &ShaderPlan, out: &mut String);
    fn depth_peel(&self, plan: &ShaderPlan, out: &mut String);
}

type Emit = fn(&dyn DialectWriter, &ShaderPlan, &mut String);

/// One independent block of program text.
pub(crate) struct Region {
    pub name: &'static str,
    pub applies: fn(&ShaderPlan) -> bool,
    pub emit: Emit,
}

fn always(_: &ShaderPlan) -> bool {
    true
}

const GOURAUD_VERTEX: &[Region] = &[
    Region {
        name: "header",
        applies: always,
        emit: |w, p, o| w.gouraud_vertex_header(p, o),
    },
    Region {
        name: "lighting",
        applies: always,
        emit: |w, p, o| w.gouraud_vertex_lighting(p, o),
    },
    Region {
        name: "texture coordinates",
        applies: ShaderPlan::has_texture,
        emit: |w, p, o| w.texture_coordinates(p, o),
    },
    Region {
        name: "end",
        applies: always,
        emit: |w, p, o| w.gouraud_vertex_end(p, o),
    },
];

const GOURAUD_FRAGMENT: &[Region] = &[
    Region {
        name: "header",
        applies: always,
        emit: |w, p, o| w.gouraud_fragment_header(p, o),
    },
    Region {
        name: "eye space",
        applies: always,
        emit: |w, p, o| w.gouraud_fragment_eye_space(p, o),
    },
    Region {
        name: "depth peel",
        applies: ShaderPlan::peels,
        emit: |w, p, o| w.depth_peel(p, o),
    },
    Region {
        name: "lighting",
        applies: always,
        emit: |w, p, o| w.gouraud_fragment_lighting(p, o),
    },
    Region {
        name: "colour sample",
        applies: |p| p.colour.is_some(),
        emit: |w, p, o| w.gouraud_colour_sample(p, o),
    },
    Region {
        name: "combine",
        applies: always,
        emit: |w, p, o| w.gouraud_combine(p, o),
    },
    Region {
        name: "end",
        applies: always,
        emit: |w, p, o| w.gouraud_fragment_end(p, o),
    },
];

const PER_PIXEL_VERTEX: &[Region] = &[
    Region {
        name: "header",
        applies: always,
        emit: |w, p, o| w.per_pixel_vertex_header(p, o),
    },
    Region {
        name: "eye vertex",
        applies: always,
        emit: |w, p, o| w.per_pixel_eye_vertex(p, o),
    },
    Region {
        name: "texture coordinates",
        applies: ShaderPlan::has_texture,
        emit: |w, p, o| w.texture_coordinates(p, o),
    },
    Region {
        name: "tangent space",
        applies: ShaderPlan::bump_mapped,
        emit: |w, p, o| w.tangent_space(p, o),
    },
    Region {
        name: "eye normal",
        applies: |p| !p.bump_mapped(),
        emit: |w, p, o| w.eye_normal(p, o),
    },
    Region {
        name: "clip position",
        applies: ShaderPlan::is_layered,
        emit: |w, p, o| w.clip_position(p, o),
    },
    Region {
        name: "end",
        applies: always,
        emit: |w, p, o| w.per_pixel_vertex_end(p, o),
    },
];

const PER_PIXEL_FRAGMENT: &[Region] = &[
    Region {
        name: "header",
        applies: always,
        emit: |w, p, o| w.per_pixel_fragment_header(p, o),
    },
    Region {
        name: "eye space",
        applies: ShaderPlan::is_layered,
        emit: |w, p, o| w.per_pixel_eye_space(p, o),
    },
    Region {
        name: "depth peel",
        applies: ShaderPlan::peels,
        emit: |w, p, o| w.depth_peel(p, o),
    },
    Region {
        name: "colour sample",
        applies: |p| p.colour.is_some(),
        emit: |w, p, o| w.per_pixel_colour_sample(p, o),
    },
    Region {
        name: "second sample",
        applies: |p| p.second.is_some(),
        emit: |w, p, o| w.second_sample(p, o),
    },
    Region {
        name: "surface normal",
        applies: |p| !p.decal(),
        emit: |w, p, o| w.surface_normal(p, o),
    },
    Region {
        name: "lighting",
        applies: |p| !p.decal(),
        emit: |w, p, o| w.per_pixel_lighting(p, o),
    },
    Region {
        name: "combine",
        applies: |p| p.colour.is_some(),
        emit: |w, p, o| w.per_pixel_combine(p, o),
    },
    Region {
        name: "colour lookup",
        applies: |p| {
            p.lookup
                .as_ref()
                .is_some_and(|l| l.output != LookupOutput::PerComponent)
        },
        emit: |w, p, o| w.colour_lookup(p, o),
    },
    Region {
        name: "component lookup",
        applies: |p| {
            p.lookup
                .as_ref()
                .is_some_and(|l| l.output == LookupOutput::PerComponent)
        },
        emit: |w, p, o| w.component_lookup(p, o),
    },
    Region {
        name: "lit volume",
        applies: |p| p.lit_volume.is_some(),
        emit: |w, p, o| w.lit_volume(p, o),
    },
    Region {
        name: "depth write",
        applies: ShaderPlan::is_layered,
        emit: |w, p, o| w.depth_write(p, o),
    },
    Region {
        name: "end",
        applies: always,
        emit: |w, p, o| w.per_pixel_fragment_end(p, o),
    },
];

/// Region tables for the vertex and fragment stage of `lighting`.
pub(crate) fn stage_regions(lighting: Lighting) -> (&'static [Region], &'static [Region]) {
    match lighting {
        Lighting::Gouraud => (GOURAUD_VERTEX, GOURAUD_FRAGMENT),
        Lighting::PerPixel => (PER_PIXEL_VERTEX, PER_PIXEL_FRAGMENT),
    }
}

fn run_regions(regions: &[Region], writer: &dyn DialectWriter, plan: &ShaderPlan) -> String {
    let mut out = String::with_capacity(2048);
    for region in regions {
        if (region.applies)(plan) {
            log::trace!("Emitting {} region `{}`", plan.key, region.name);
            (region.emit)(writer, plan, &mut out);
        }
    }
    out
}

fn writer_for(dialect: Dialect) -> &'static dyn DialectWriter {
    match dialect {
        Dialect::Legacy => &assembly::AssemblyWriter,
        Dialect::Modern => &glsl::GlslWriter,
    }
}

/// Synthesizes the program text for `key`.
///
/// # Errors
///
/// * [`ShaderError::UserSourceSynthesis`] for the specified-strings sentinel.
/// * [`ShaderError::Synthesis`] when the key holds a combination no region can express.
pub fn synthesize(key: FeatureKey, dialect: Dialect, hints: VendorHints) -> Result<SynthesizedSource> {
    if key.is_specified_strings() {
        return Err(ShaderError::UserSourceSynthesis);
    }
    let plan = ShaderPlan::new(key, hints).map_err(|reason| {
        log::warn!("Cannot synthesize key {key} for {dialect:?}: {reason}");
        ShaderError::Synthesis {
            key,
            dialect,
            reason,
        }
    })?;

    let writer = writer_for(dialect);
    debug_assert_eq!(writer.dialect(), dialect);
    let (vertex_regions, fragment_regions) = stage_regions(plan.lighting);
    let source = SynthesizedSource {
        vertex: run_regions(vertex_regions, writer, &plan),
        fragment: run_regions(fragment_regions, writer, &plan),
        geometry: None,
    };
    log::debug!(
        "Synthesized {dialect:?} program for key {key} ({} + {} bytes)",
        source.vertex.len(),
        source.fragment.len()
    );
    Ok(source)
}

// ----------------------------------------------------------------------------
// Helpers shared by both writers
// ----------------------------------------------------------------------------

/// GLSL scalar/vector type with `n` components, 1..=4.
pub(crate) fn glsl_type(n: u32) -> &'static str {
    match n {
        1 => "float",
        2 => "vec2",
        3 => "vec3",
        _ => "vec4",
    }
}

pub(crate) const AXIS_LABELS: [char; 3] = ['x', 'y', 'z'];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::dialect::DepthCompare;

    fn modern(key: FeatureKey) -> SynthesizedSource {
        synthesize(key, Dialect::Modern, VendorHints::default()).unwrap()
    }

    fn legacy(key: FeatureKey) -> SynthesizedSource {
        synthesize(key, Dialect::Legacy, VendorHints::default()).unwrap()
    }

    fn all_keys() -> Vec<FeatureKey> {
        let rgba_2d = FeatureKey::colour_texture(2, 4, false).unwrap();
        let grey_3d = FeatureKey::colour_texture(3, 1, false).unwrap();
        vec![
            FeatureKey::GOURAUD_SHADING,
            FeatureKey::GOURAUD_SHADING | rgba_2d,
            FeatureKey::GOURAUD_SHADING | rgba_2d | FeatureKey::ORDER_INDEPENDENT_PEEL_LAYER,
            FeatureKey::PER_PIXEL_LIGHTING,
            FeatureKey::PER_PIXEL_LIGHTING | grey_3d | FeatureKey::LIT_VOLUME_FINITE_DIFFERENCE_NORMAL,
            FeatureKey::PER_PIXEL_LIGHTING
                | rgba_2d
                | FeatureKey::second_texture(2).unwrap()
                | FeatureKey::SECOND_TEXTURE_BUMPMAP,
            FeatureKey::PER_PIXEL_LIGHTING
                | FeatureKey::DEPENDENT_TEXTURE_1
                | FeatureKey::DEPENDENT_TEXTURE_2
                | FeatureKey::DEPENDENT_TEXTURE_COLOUR,
            FeatureKey::PER_PIXEL_LIGHTING | FeatureKey::ORDER_INDEPENDENT_FIRST_LAYER,
        ]
    }

    #[test]
    fn sentinel_is_never_synthesized() {
        let err = synthesize(FeatureKey::SPECIFIED_STRINGS, Dialect::Modern, VendorHints::default())
            .unwrap_err();
        assert!(matches!(err, ShaderError::UserSourceSynthesis));
    }

    #[test]
    fn invalid_key_carries_key_and_dialect() {
        let key = FeatureKey::GOURAUD_SHADING | FeatureKey::SECOND_TEXTURE_BUMPMAP;
        match synthesize(key, Dialect::Legacy, VendorHints::default()) {
            Err(ShaderError::Synthesis {
                key: k, dialect, ..
            }) => {
                assert_eq!(k, key);
                assert_eq!(dialect, Dialect::Legacy);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn is_deterministic() {
        for key in all_keys() {
            assert_eq!(modern(key), modern(key));
            assert_eq!(legacy(key), legacy(key));
        }
    }

    #[test]
    fn dialect_terminators() {
        for key in all_keys() {
            let glsl = modern(key);
            assert!(glsl.vertex.trim_end().ends_with('}'), "{key}");
            assert!(glsl.fragment.trim_end().ends_with('}'), "{key}");
            assert!(glsl.geometry.is_none());

            let arb = legacy(key);
            assert!(arb.vertex.starts_with("!!ARBvp1.0"), "{key}");
            assert!(arb.fragment.starts_with("!!ARBfp1.0"), "{key}");
            assert!(arb.vertex.trim_end().ends_with("END"), "{key}");
            assert!(arb.fragment.trim_end().ends_with("END"), "{key}");
        }
    }

    #[test]
    fn texture_coordinates_only_with_textures() {
        assert!(!modern(FeatureKey::GOURAUD_SHADING).vertex.contains("texture_scaling"));
        let key = FeatureKey::GOURAUD_SHADING | FeatureKey::colour_texture(1, 3, false).unwrap();
        let source = modern(key);
        assert!(source.vertex.contains("uniform vec4 texture_scaling;"));
        assert!(source.vertex.contains("gl_TexCoord[0] = texture_scaling * gl_MultiTexCoord0;"));
        assert!(source.fragment.contains("uniform sampler1D texture0;"));
        assert!(source.fragment.contains("texture1D(texture0, float(gl_TexCoord[0]))"));
    }

    #[test]
    fn peel_region_follows_vendor_hints() {
        let key = FeatureKey::GOURAUD_SHADING | FeatureKey::ORDER_INDEPENDENT_PEEL_LAYER;
        let shadow = VendorHints {
            depth_compare: DepthCompare::ShadowSampler,
            depth_bias: -0.0001,
        };
        let glsl = synthesize(key, Dialect::Modern, shadow).unwrap().fragment;
        assert!(glsl.contains("sampler2DRectShadow samplertex"));
        assert!(glsl.contains("gl_FragCoord.z -0.0001"));
        let arb = synthesize(key, Dialect::Legacy, shadow).unwrap().fragment;
        assert!(arb.contains("OPTION ARB_fragment_program_shadow;"));
        assert!(arb.contains("SHADOWRECT"));

        let manual = modern(key).fragment;
        assert!(manual.contains("uniform sampler2DRect samplertex;"));
        assert!(manual.contains("texture2DRect(samplertex"));
        assert!(!manual.contains("-0.0001"));
        let manual_arb = legacy(key).fragment;
        assert!(!manual_arb.contains("OPTION"));
        assert!(manual_arb.contains("texture[3], RECT;"));
    }

    #[test]
    fn first_layer_has_no_peel() {
        let source = modern(FeatureKey::GOURAUD_SHADING | FeatureKey::ORDER_INDEPENDENT_FIRST_LAYER);
        assert!(!source.fragment.contains("samplertex"));
        assert!(source.fragment.contains("gl_FragDepth"));
    }

    #[test]
    fn per_pixel_layers_pass_clip_position() {
        let key = FeatureKey::PER_PIXEL_LIGHTING | FeatureKey::ORDER_INDEPENDENT_PEEL_LAYER;
        let glsl = modern(key);
        assert!(glsl.vertex.contains("gl_TexCoord[4] = gl_ModelViewProjectionMatrix * gl_Vertex;"));
        assert!(glsl.fragment.contains("gl_FragDepth = eyespaceCoord.z;"));
        assert!(glsl.fragment.contains("discard"));
        let arb = legacy(key);
        assert!(arb.vertex.contains("result.texcoord[4]"));
        assert!(arb.fragment.contains("result.depth.z"));
    }

    #[test]
    fn bump_map_builds_tangent_space() {
        let key = FeatureKey::PER_PIXEL_LIGHTING
            | FeatureKey::colour_texture(2, 3, false).unwrap()
            | FeatureKey::second_texture(2).unwrap()
            | FeatureKey::SECOND_TEXTURE_BUMPMAP;
        let glsl = modern(key);
        assert!(glsl.vertex.contains("TBN_Matrix"));
        assert!(!glsl.vertex.contains("gl_TexCoord[3]"));
        assert!(glsl.fragment.contains("n = normalize(2.0 * tex2 - 1.0);"));
        let arb = legacy(key);
        assert!(arb.vertex.contains("ATTRIB tangent = vertex.texcoord[1];"));
        assert!(arb.fragment.contains("MAD      normal, two, tex2, m_one;"));

        let flat = modern(FeatureKey::PER_PIXEL_LIGHTING);
        assert!(!flat.vertex.contains("TBN_Matrix"));
        assert!(flat.fragment.contains("n = normalize(gl_TexCoord[3].xyz);"));
        assert!(flat.fragment.contains("n = -n;"));
    }

    #[test]
    fn decal_skips_lighting() {
        let key = FeatureKey::PER_PIXEL_LIGHTING | FeatureKey::colour_texture(2, 4, true).unwrap();
        let source = modern(key);
        assert!(source.fragment.contains("color = tex;"));
        assert!(!source.fragment.contains("NdotL ="));
    }

    #[test]
    fn lit_volume_finite_difference_steps_each_axis() {
        let key = FeatureKey::PER_PIXEL_LIGHTING
            | FeatureKey::colour_texture(3, 1, false).unwrap()
            | FeatureKey::LIT_VOLUME_FINITE_DIFFERENCE_NORMAL
            | FeatureKey::LIT_VOLUME_SCALE_ALPHA;
        let glsl = modern(key).fragment;
        for axis in ["x", "y", "z"] {
            assert!(glsl.contains(&format!("stencil_{axis}up")));
            assert!(glsl.contains(&format!("n.{axis} = tex_up.r - tex_down.r;")));
        }
        assert!(glsl.contains("uniform vec4 texture_scaling, normal_scaling;"));
        assert!(glsl.contains("color.w = unlitColour.w * normalMag;"));
        let arb = legacy(key).fragment;
        assert!(arb.contains("PARAM normal_scaling = program.env[3];"));
        assert!(arb.contains("MUL		finalCol.w, unlitColour.w, normalMag.w;"));
    }

    #[test]
    fn intensity_normal_reads_gba() {
        let key = FeatureKey::PER_PIXEL_LIGHTING
            | FeatureKey::colour_texture(3, 4, false).unwrap()
            | FeatureKey::LIT_VOLUME_INTENSITY_NORMAL_TEXTURE;
        assert!(modern(key).fragment.contains("n = 2.0 * tex.gba - 1.0;"));
        assert!(legacy(key).fragment.contains("tex.gbaa"));
    }

    #[test]
    fn multi_channel_lookup_uses_matching_sampler() {
        let key = FeatureKey::PER_PIXEL_LIGHTING
            | FeatureKey::DEPENDENT_TEXTURE_1
            | FeatureKey::DEPENDENT_TEXTURE_3
            | FeatureKey::DEPENDENT_TEXTURE_COLOUR
            | FeatureKey::DEPENDENT_TEXTURE_ALPHA;
        let glsl = modern(key).fragment;
        assert!(glsl.contains("uniform sampler2D texture1;"));
        assert!(glsl.contains("color.rbrr * lookup_scales + lookup_offsets"));
        assert!(glsl.contains("texture2D(texture1, vec2(offsetcolour))"));
        assert!(glsl.contains("color = dependentlookup;"));
        let arb = legacy(key).fragment;
        assert!(arb.contains("PARAM lookup_offsets = program.env[1];"));
        assert!(arb.contains("finalCol.rbrr, lookup_scales, lookup_offsets;"));
        assert!(arb.contains("texture[1], 2D;"));
    }
}
