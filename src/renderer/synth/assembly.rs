//! Assembly-style `ARB_vertex_program` / `ARB_fragment_program` text.
//!
//! Every program opens with its `!!ARB` header and closes with `END`. `OPTION`
//! statements must precede all other statements, so the header regions emit them.

use super::plan::{LookupOutput, ShaderPlan, VolumeNormal};
use super::{AXIS_LABELS, DialectWriter};
use crate::renderer::dialect::{DepthCompare, Dialect};
use crate::renderer::program::{BuiltinUniform, DEPTH_LAYER_UNIT};

pub(crate) struct AssemblyWriter;

const LIGHT_ATTENUATION: &str = "#Normalize lightvec and viewvec.\n\
     DP3		Len.w, fragment.texcoord[1], fragment.texcoord[1];\n\
     RSQ		lightVec.w, Len.w;\n\
     MUL		lightVec.xyz, fragment.texcoord[1], lightVec.w;\n\
     DP3		viewVec.w, fragment.texcoord[2], fragment.texcoord[2];\n\
     RSQ		viewVec.w, viewVec.w;\n\
     MUL		viewVec.xyz, fragment.texcoord[2], viewVec.w;\n\
     #Calculate attenuation.\n\
     MAD		attenuation, state.light[0].attenuation.z, Len.w, state.light[0].attenuation.x;\n\
     RCP		Len, lightVec.w;\n\
     MAD		attenuation, Len.w, state.light[0].attenuation.y, attenuation.x;\n\
     RCP		attenuation.x, attenuation.x;\n";

const LOOKUP_REMAP_COMMENT: &str = "#Offset and scale to counteract effect of linear interpolation\n\
     #starting at the middle of the first texel and finishing in the\n\
     #middle of the last texel\n";

fn texture_scaling_param(plan: &ShaderPlan, out: &mut String) {
    if plan.has_texture() {
        out.push_str(&format!(
            "PARAM texture_scaling = program.env[{}];\n",
            BuiltinUniform::TextureScaling.legacy_env_index()
        ));
    }
}

fn fragment_header(plan: &ShaderPlan, out: &mut String) {
    out.push_str("!!ARBfp1.0\n");
    if plan.peels() && plan.hints.depth_compare == DepthCompare::ShadowSampler {
        out.push_str("OPTION ARB_fragment_program_shadow;\n");
    }
}

fn peel_declarations(plan: &ShaderPlan, out: &mut String) {
    if plan.peels() {
        out.push_str(&format!(
            "PARAM texturesize = program.env[{}];\nTEMP tex4, kill, tex4coord;\n",
            BuiltinUniform::TextureSize.legacy_env_index()
        ));
    }
}

/// Perspective divide of the clip position passed in `texcoord[unit]`.
fn eye_space(unit: u32, out: &mut String) {
    out.push_str(&format!(
        "TEMP eyespaceCoord, perspective;\n\
         PARAM point_five = {{0.5, 0.5, 0.5, 0.5}};\n\
         MOV      eyespaceCoord, fragment.texcoord[{unit}];\n\
         RCP      perspective.w, eyespaceCoord.w;\n\
         MUL      eyespaceCoord, eyespaceCoord, perspective.w;\n\
         MAD      eyespaceCoord, eyespaceCoord, point_five, point_five;\n\
         MOV      eyespaceCoord.w, 1.0;\n"
    ));
}

fn clip_position(unit: u32, out: &mut String) {
    for (row, label) in ['x', 'y', 'z', 'w'].iter().enumerate() {
        out.push_str(&format!("DP4 result.texcoord[{unit}].{label}, c0[{row}], position;\n"));
    }
}

fn result_position(out: &mut String) {
    out.push_str(
        "DP4 result.position.x, c0[0], position;\n\
         DP4 result.position.y, c0[1], position;\n\
         DP4 result.position.z, c0[2], position;\n\
         DP4 result.position.w, c0[3], position;\n",
    );
}

impl DialectWriter for AssemblyWriter {
    fn dialect(&self) -> Dialect {
        Dialect::Legacy
    }

    // ------------------------------------------------------------------------
    // Gouraud
    // ------------------------------------------------------------------------

    fn gouraud_vertex_header(&self, plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "!!ARBvp1.0\n\
             ATTRIB normal = vertex.normal;\n\
             ATTRIB position = vertex.position;\n\
             PARAM c0[4] = { state.matrix.mvp };\n\
             PARAM c1[4] = { state.matrix.modelview };\n\
             PARAM c2[4] = { state.matrix.modelview.invtrans };\n\
             PARAM eyeCameraPos = {0, 0, 0, 0};\n\
             PARAM eyeLightPos = state.light[0].position;\n\
             PARAM two = {2.0, 2.0, 2.0, 2.0};\n\
             PARAM m_one = {-1.0, -1.0, -1.0, -1.0};\n",
        );
        texture_scaling_param(plan, out);
    }

    fn gouraud_vertex_lighting(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "TEMP eyeVertex;\n\
             TEMP eyeNormal;\n\
             TEMP temp_col;\n\
             TEMP temp_col2;\n\
             TEMP lightVec, Len, finalCol, attenuation, lightContrib;\n\
             \n\
             #Vertex position in eyespace\n\
             DP4 eyeVertex.x, c1[0], position;\n\
             DP4 eyeVertex.y, c1[1], position;\n\
             DP4 eyeVertex.z, c1[2], position;\n\
             \n\
             DP4 eyeNormal.x, c2[0], normal;\n\
             DP4 eyeNormal.y, c2[1], normal;\n\
             DP4 eyeNormal.z, c2[2], normal;\n\
             \n\
             DP3 eyeNormal.w, eyeNormal, eyeNormal;\n\
             RSQ eyeNormal.w, eyeNormal.w;\n\
             MUL eyeNormal.xyz, eyeNormal.w, eyeNormal;\n\
             \n\
             SUB lightVec, eyeLightPos, eyeVertex;\n\
             \n\
             #Normalize lightvec and viewvec.\n\
             DP3		Len.w, lightVec, lightVec;\n\
             RSQ		lightVec.w, Len.w;\n\
             MUL		lightVec.xyz, lightVec, lightVec.w;\n\
             \n\
             #Calculate attenuation.\n\
             MAD		attenuation, state.light[0].attenuation.z, Len.w, state.light[0].attenuation.x;\n\
             RCP		Len, lightVec.w;\n\
             MAD		attenuation, Len.w, state.light[0].attenuation.y, attenuation.x;\n\
             RCP		attenuation.x, attenuation.x;\n\
             \n\
             #Diffuse\n\
             DP3      lightContrib.x, eyeNormal, lightVec;\n\
             ABS      lightContrib.x, lightContrib.x;\n\
             \n\
             #Specular\n\
             DP3      lightContrib.y, eyeNormal, state.light[0].half;\n\
             ABS      lightContrib.y, lightContrib.y;\n\
             MOV		lightContrib.w, state.material.shininess.x;\n\
             \n\
             #Accelerates lighting computations\n\
             LIT	lightContrib, lightContrib;\n\
             \n\
             MUL    temp_col,  state.light[0].diffuse, vertex.color;\n\
             MAD		finalCol, lightContrib.y, temp_col, state.lightprod[0].ambient;\n\
             MOV    temp_col2, state.lightprod[0].specular;\n\
             MAD		finalCol.xyz, lightContrib.z, temp_col2, finalCol;\n\
             MAD		finalCol, finalCol, attenuation.x, state.material.emission;\n\
             MAD		finalCol, state.material.ambient, state.lightmodel.ambient, finalCol;\n\
             MOV finalCol.w, temp_col.w;\n\
             \n",
        );
    }

    fn gouraud_vertex_end(&self, _plan: &ShaderPlan, out: &mut String) {
        clip_position(1, out);
        out.push_str(
            "\nMOV result.color, finalCol;\n\
             MOV result.color.back, finalCol;\n",
        );
        result_position(out);
        out.push_str("\nEND\n");
    }

    fn gouraud_fragment_header(&self, plan: &ShaderPlan, out: &mut String) {
        fragment_header(plan, out);
        peel_declarations(plan, out);
    }

    fn gouraud_fragment_eye_space(&self, _plan: &ShaderPlan, out: &mut String) {
        eye_space(1, out);
    }

    fn gouraud_fragment_lighting(&self, _plan: &ShaderPlan, _out: &mut String) {
        // The vertex program already wrote the lit colour into fragment.color.
    }

    fn gouraud_colour_sample(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(colour) = plan.colour else { return };
        out.push_str(&format!(
            "TEMP		tex;\nTEX		tex, fragment.texcoord[0], texture[0], {}D;\n",
            colour.dimension
        ));
    }

    fn gouraud_combine(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(colour) = plan.colour else {
            out.push_str("MOV      result.color.xyzw, fragment.color.rgba;\n");
            return;
        };
        let text = match (colour.decal, colour.components) {
            (false, 3) => "MUL		result.color.xyz, fragment.color, tex;\nMOV	  result.color.w, fragment.color.w;\n",
            (false, 1) => "MUL		result.color.xyz, fragment.color.xyz, tex.x;\nMOV	  result.color.w, fragment.color.w;\n",
            (false, 2) => "MUL		result.color.xyz, fragment.color.xyz, tex.x;\nMUL		result.color.w, fragment.color.w, tex.y;\n",
            (false, _) => "MUL		result.color, fragment.color, tex;\n",
            (true, 3) => "MOV		result.color.xyz, tex;\nMOV		result.color.w, state.material.diffuse.w;\n",
            (true, 1) => "MOV		result.color.xyz, tex.x;\nMOV		result.color.w, state.material.diffuse.w;\n",
            (true, 2) => "MOV		result.color.xyz, tex.x;\nMOV		result.color.w, tex.y;\n",
            (true, _) => "MOV		result.color, tex;\n",
        };
        out.push_str(text);
    }

    fn gouraud_fragment_end(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("MOV		 result.depth.z, eyespaceCoord.z;\n\nEND\n");
    }

    // ------------------------------------------------------------------------
    // Per-pixel vertex
    // ------------------------------------------------------------------------

    fn per_pixel_vertex_header(&self, plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "!!ARBvp1.0\n\
             ATTRIB normal = vertex.normal;\n\
             ATTRIB position = vertex.position;\n",
        );
        texture_scaling_param(plan, out);
        if plan.bump_mapped() {
            out.push_str("ATTRIB tangent = vertex.texcoord[1];\n");
        }
        out.push_str(
            "PARAM c0[4] = { state.matrix.mvp };\n\
             PARAM c1[4] = { state.matrix.modelview };\n\
             PARAM eyeCameraPos = {0, 0, 0, 0};\n\
             PARAM eyeLightPos = state.light[0].position;\n\
             TEMP eyeVertex;\n\
             TEMP viewVec;\n",
        );
        if plan.bump_mapped() {
            out.push_str(
                "PARAM c3[4] = { state.matrix.modelview.inverse };\n\
                 TEMP lightVec;\n\
                 TEMP objectLight;\n\
                 TEMP cameraVec;\n\
                 TEMP objectCamera;\n\
                 TEMP binormal;\n",
            );
        } else {
            out.push_str(
                "PARAM c2[4] = { state.matrix.modelview.invtrans };\n\
                 TEMP eyeNormal;\n",
            );
        }
    }

    fn per_pixel_eye_vertex(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "#Vertex position in eyespace\n\
             DP4 eyeVertex.x, c1[0], position;\n\
             DP4 eyeVertex.y, c1[1], position;\n\
             DP4 eyeVertex.z, c1[2], position;\n\
             DP4 eyeVertex.w, c1[3], position;\n",
        );
    }

    fn tangent_space(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "MUL binormal.xyz, tangent.zxyz, normal.yzxy;\n\
             MAD binormal.xyz, tangent.yzxy, normal.zxyz, -binormal.xyzx;\n\
             SUB lightVec, eyeLightPos, eyeVertex;\n\
             DP3 objectLight.x, c3[0], lightVec;\n\
             DP3 objectLight.y, c3[1], lightVec;\n\
             DP3 objectLight.z, c3[2], lightVec;\n\
             DP3 result.texcoord[1].x, tangent, objectLight;\n\
             DP3 result.texcoord[1].y, binormal, objectLight;\n\
             DP3 result.texcoord[1].z, normal, objectLight;\n\
             SUB cameraVec, eyeCameraPos, eyeVertex;\n\
             DP3 objectCamera.x, c3[0], cameraVec;\n\
             DP3 objectCamera.y, c3[1], cameraVec;\n\
             DP3 objectCamera.z, c3[2], cameraVec;\n\
             DP3 result.texcoord[2].x, tangent, objectCamera;\n\
             DP3 result.texcoord[2].y, binormal, objectCamera;\n\
             DP3 result.texcoord[2].z, normal, objectCamera;\n",
        );
    }

    fn eye_normal(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "DP4 eyeNormal.x, c2[0], normal;\n\
             DP4 eyeNormal.y, c2[1], normal;\n\
             DP4 eyeNormal.z, c2[2], normal;\n\
             DP3 eyeNormal.w, eyeNormal, eyeNormal;\n\
             RSQ eyeNormal.w, eyeNormal.w;\n\
             MUL eyeNormal.xyz, eyeNormal.w, eyeNormal;\n\
             SUB viewVec, eyeCameraPos, eyeVertex;\n\
             DP3 viewVec.w, viewVec, viewVec;\n\
             RSQ viewVec.w, viewVec.w;\n\
             MUL viewVec.xyz, viewVec.w, viewVec;\n\
             SUB result.texcoord[1], eyeLightPos, eyeVertex;\n\
             MOV result.texcoord[2], viewVec;\n\
             MOV result.texcoord[3], eyeNormal;\n",
        );
    }

    fn clip_position(&self, _plan: &ShaderPlan, out: &mut String) {
        clip_position(4, out);
    }

    fn per_pixel_vertex_end(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "MOV result.color, vertex.color;\n\
             MOV result.color.back, vertex.color;\n\
             MOV result.color.secondary,  {1, 1, 1, 1};\n\
             MOV result.color.back.secondary,  {0, 0, 0, 0};\n",
        );
        result_position(out);
        out.push_str("END\n");
    }

    // ------------------------------------------------------------------------
    // Per-pixel fragment
    // ------------------------------------------------------------------------

    fn per_pixel_fragment_header(&self, plan: &ShaderPlan, out: &mut String) {
        fragment_header(plan, out);
        out.push_str(
            "TEMP lightVec, viewVec, reflVec, normal, attenuation, Len, finalCol, lightContrib, reverse, tex, tex2;\n\
             PARAM two = {2.0, 2.0, 2.0, 2.0};\n\
             PARAM m_one = {-1.0, -1.0, -1.0, -1.0};\n",
        );
        if plan.lookup.is_some() {
            out.push_str(&format!(
                "PARAM lookup_offsets = program.env[{}];\nPARAM lookup_scales = program.env[{}];\n",
                BuiltinUniform::LookupOffsets.legacy_env_index(),
                BuiltinUniform::LookupScales.legacy_env_index()
            ));
        }
        peel_declarations(plan, out);
        out.push_str(
            "#Set up reverse vector based on secondary colour\n\
             MAD      reverse, two, fragment.color.secondary.x, m_one;\n",
        );
    }

    fn per_pixel_eye_space(&self, _plan: &ShaderPlan, out: &mut String) {
        eye_space(4, out);
    }

    fn per_pixel_colour_sample(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(colour) = plan.colour else { return };
        out.push_str(&format!(
            "TEX		tex, fragment.texcoord[0], texture[0], {}D;\n",
            colour.dimension
        ));
    }

    fn second_sample(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(second) = plan.second else { return };
        out.push_str(&format!(
            "TEX		tex2, fragment.texcoord[0], texture[1], {}D;\n",
            second.dimension
        ));
    }

    fn surface_normal(&self, plan: &ShaderPlan, out: &mut String) {
        if plan.bump_mapped() {
            out.push_str(
                "#Expand the range of the normal texture\n\
                 MAD      normal, two, tex2, m_one;\n\
                 #Reverse the texture normal direction component if required\n\
                 MUL      normal.z, reverse.z, normal.z;\n",
            );
        } else {
            out.push_str(
                "#Normalize the normal.\n\
                 DP3		normal.w, fragment.texcoord[3], fragment.texcoord[3];\n\
                 RSQ		normal.w, normal.w;\n\
                 MUL		normal.xyz, fragment.texcoord[3], normal.w;\n\
                 #Reverse the normal if required\n\
                 MUL      normal, reverse, normal;\n",
            );
        }
    }

    fn per_pixel_lighting(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(LIGHT_ATTENUATION);
        out.push_str(
            "#Diffuse\n\
             DP3_SAT	   lightContrib.x, normal, lightVec;\n\
             \n\
             #Specular\n\
             # Phong:\n\
             DP3		reflVec, lightVec, normal;\n\
             MUL		reflVec, reflVec, two;\n\
             MAD		reflVec, reflVec, normal, -lightVec;\n\
             \n\
             DP3_SAT	lightContrib.y, reflVec, viewVec;\n\
             MOV		lightContrib.w, state.material.shininess.x;\n\
             #Accelerates lighting computations\n\
             LIT	lightContrib, lightContrib;\n\
             MAD		finalCol, lightContrib.y, fragment.color, state.lightprod[0].ambient;\n\
             MAD		finalCol, lightContrib.z, state.lightprod[0].specular, finalCol;\n\
             MAD		finalCol, finalCol, attenuation.x, state.material.emission;\n\
             #Ambient lighting contribution;\n\
             MAD		finalCol, fragment.color, state.lightmodel.ambient, finalCol;\n\
             #Alpha value;\n\
             MOV		finalCol.w, state.material.diffuse.w;\n",
        );
    }

    fn per_pixel_combine(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(colour) = plan.colour else { return };
        let text = match (colour.decal, colour.components) {
            (false, 3) => "MUL		finalCol.xyz, finalCol, tex;\n",
            (false, 1) => "MUL		finalCol.xyz, finalCol.xyz, tex.x;\n",
            (false, 2) => "MUL		finalCol.xyz, finalCol.xyz, tex.x;\nMUL		finalCol.w, finalCol.w, tex.y;\n",
            (false, _) => "MUL		finalCol, finalCol, tex;\n",
            (true, 3) => "MOV		finalCol.xyz, tex;\nMOV		finalCol.w, state.material.diffuse.w;\n",
            (true, 1) => "MOV		finalCol.xyz, tex.x;\nMOV		finalCol.w, state.material.diffuse.w;\n",
            (true, 2) => "MOV		finalCol.xyz, tex.x;\nMOV		finalCol.w, tex.y;\n",
            (true, _) => "MOV		finalCol, tex;\n",
        };
        out.push_str(text);
    }

    fn colour_lookup(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(lookup) = &plan.lookup else { return };
        out.push_str("TEMP dependentlookup;\nTEMP offsetcolour;\n");
        out.push_str(LOOKUP_REMAP_COMMENT);
        out.push_str(&format!(
            "MAD		offsetcolour, finalCol.{}, lookup_scales, lookup_offsets;\n\
             TEX		dependentlookup, offsetcolour, texture[1], {}D;\n",
            lookup.padded_swizzle(),
            lookup.input_count()
        ));
        match lookup.output {
            LookupOutput::Colour => out.push_str("MOV		finalCol.rgb, dependentlookup;\n"),
            LookupOutput::Alpha => out.push_str("MUL		finalCol.w, finalCol.w, dependentlookup.r;\n"),
            LookupOutput::ColourAndAlpha => out.push_str("MOV		finalCol, dependentlookup;\n"),
            LookupOutput::PerComponent => {}
        }
    }

    fn component_lookup(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(lookup) = &plan.lookup else { return };
        out.push_str("TEMP dependentlookup;\nTEMP offsetcolour;\n");
        for channel in lookup.swizzle().chars() {
            out.push_str(LOOKUP_REMAP_COMMENT);
            out.push_str(&format!(
                "MAD		offsetcolour, finalCol.{channel}{channel}{channel}{channel}, lookup_scales, lookup_offsets;\n\
                 TEX		dependentlookup, offsetcolour, texture[1], 1D;\n\
                 MOV		finalCol.{channel}, dependentlookup.r;\n"
            ));
        }
    }

    fn lit_volume(&self, plan: &ShaderPlan, out: &mut String) {
        let (Some(volume), Some(colour)) = (plan.lit_volume, plan.colour) else {
            return;
        };
        out.push_str("TEMP unlitColour;\nMOV     unlitColour, finalCol;\n");
        match volume.normal {
            VolumeNormal::IntensityTexture => out.push_str(
                "#Expand the range of the normal texture\n\
                 MAD     normal, two, tex.gbaa, m_one;\n",
            ),
            VolumeNormal::FiniteDifference => {
                let d = colour.dimension;
                out.push_str(&format!(
                    "#Calculate a finite difference normal based on the magnitude of texture components used.\n\
                     PARAM texture_scaling = program.env[{}];\n\
                     PARAM normal_scaling = program.env[{}];\n\
                     TEMP position_up, position_down, tex_up, tex_down;\n\
                     MOV      normal, {{0, 0, 0, 0}};\n\n",
                    BuiltinUniform::TextureScaling.legacy_env_index(),
                    BuiltinUniform::NormalScaling.legacy_env_index()
                ));
                for (axis, label) in AXIS_LABELS.iter().enumerate().take(d as usize) {
                    let step = |i: usize| i32::from(i == axis);
                    out.push_str(&format!(
                        "PARAM stencil_{label}up = {{{}, {}, {}, 0}};\n\
                         MAD      position_up, stencil_{label}up, texture_scaling, fragment.texcoord[0];\n\
                         TEX		tex_up, position_up, texture[0], {d}D;\n\
                         PARAM stencil_{label}down = {{{}, {}, {}, 0}};\n\
                         MAD      position_down, stencil_{label}down, texture_scaling, fragment.texcoord[0];\n\
                         TEX		tex_down, position_down, texture[0], {d}D;\n",
                        step(0),
                        step(1),
                        step(2),
                        -step(0),
                        -step(1),
                        -step(2),
                    ));
                    if matches!(colour.components, 3 | 4) {
                        out.push_str(&format!(
                            "SUB  tex_up, tex_up, tex_down;\n\
                             DP3	tex_up.w, tex_up, tex_up;\n\
                             RSQ  tex_up.w, tex_up.w;\n\
                             RCP  normal.{label}, tex_up.w;\n"
                        ));
                    } else {
                        out.push_str(&format!("SUB  normal.{label}, tex_up.r, tex_down.r;\n"));
                    }
                }
                out.push_str("MUL  normal, normal, normal_scaling;\n");
            }
        }
        out.push_str(
            "TEMP  eyeNormal, normalMag;\n\
             PARAM c2[4] = { state.matrix.modelview.invtrans };\n\
             \n\
             #Put the normal into eye point space\n\
             DP4 eyeNormal.x, c2[0], normal;\n\
             DP4 eyeNormal.y, c2[1], normal;\n\
             DP4 eyeNormal.z, c2[2], normal;\n\
             \n\
             #Reverse the texture normal direction component if required\n\
             MUL      eyeNormal, reverse, eyeNormal;\n\
             \n\
             #Normalize the normal.\n\
             DP3		normalMag.w, eyeNormal, eyeNormal;\n\
             RSQ		eyeNormal.w, normalMag.w;\n\
             MUL		eyeNormal.xyz, eyeNormal, eyeNormal.w;\n\
             \n",
        );
        out.push_str(LIGHT_ATTENUATION);
        out.push_str(
            "#Diffuse\n\
             DP3_SAT	   lightContrib.x, eyeNormal, lightVec;\n\
             #Specular\n\
             # Phong:\n\
             DP3		reflVec, lightVec, eyeNormal;\n\
             MUL		reflVec, reflVec, two;\n\
             MAD		reflVec, reflVec, eyeNormal, -lightVec;\n\
             \n\
             DP3_SAT	lightContrib.y, reflVec, viewVec;\n\
             MOV		lightContrib.w, state.material.shininess.x;\n\
             #Accelerates lighting computations\n\
             LIT	   lightContrib, lightContrib;\n\
             MAD		finalCol, lightContrib.y, unlitColour, state.lightprod[0].ambient;\n\
             MAD		finalCol, lightContrib.z, state.lightprod[0].specular, finalCol;\n\
             MAD		finalCol, finalCol, attenuation.x, state.material.emission;\n\
             #Ambient lighting contribution;\n\
             MAD		finalCol, unlitColour, state.lightmodel.ambient, finalCol;\n\
             #Alpha value;\n",
        );
        if volume.scale_alpha {
            out.push_str("MUL		finalCol.w, unlitColour.w, normalMag.w;\n");
        } else {
            out.push_str("MOV		finalCol.w, unlitColour.w;\n");
        }
    }

    fn depth_write(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("MOV		 result.depth.z, eyespaceCoord.z;\n");
    }

    fn per_pixel_fragment_end(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("MOV		result.color, finalCol;\nEND\n");
    }

    // ------------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------------

    fn texture_coordinates(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("MUL result.texcoord[0], texture_scaling, vertex.texcoord[0];\n");
    }

    fn depth_peel(&self, plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "MOV      tex4coord, eyespaceCoord.xyzx;\n\
             MUL      tex4coord, tex4coord, texturesize;\n",
        );
        let bias = plan.hints.has_bias();
        match plan.hints.depth_compare {
            DepthCompare::ShadowSampler => {
                if bias {
                    out.push_str(&format!(
                        "MOV     tex4coord.z, fragment.position.z;\n\
                         ADD     tex4coord.z, tex4coord.z, {};\n",
                        plan.hints.depth_bias
                    ));
                }
                out.push_str(&format!(
                    "TEX		tex4.x, tex4coord, texture[{DEPTH_LAYER_UNIT}], SHADOWRECT;\n\
                     ADD      kill.x, tex4.x, -0.5;\n\
                     KIL      kill.x;\n",
                ));
            }
            DepthCompare::Manual => {
                out.push_str("MOV     tex4coord.z, fragment.position.z;\n");
                if bias {
                    out.push_str(&format!(
                        "ADD     tex4coord.z, tex4coord.z, {};\n",
                        plan.hints.depth_bias
                    ));
                }
                out.push_str(&format!(
                    "TEX		tex4.x, tex4coord, texture[{DEPTH_LAYER_UNIT}], RECT;\n\
                     SGE      kill.x, tex4.x, tex4coord.z;\n\
                     KIL      -kill.x;\n",
                ));
            }
        }
    }
}
