//! GLSL 1.10 text for every region.

use super::plan::{LookupOutput, ShaderPlan, VolumeNormal};
use super::{AXIS_LABELS, DialectWriter, glsl_type};
use crate::renderer::dialect::{DepthCompare, Dialect};

pub(crate) struct GlslWriter;

const ATTENUATION: &str = "  att = 1.0 / (gl_LightSource[0].constantAttenuation +\n    \
     gl_LightSource[0].linearAttenuation * len +\n    \
     gl_LightSource[0].quadraticAttenuation * len * len);\n";

fn texture_scaling_uniform(plan: &ShaderPlan, out: &mut String) {
    if plan.has_texture() {
        out.push_str("uniform vec4 texture_scaling;\n");
    }
}

fn peel_declarations(plan: &ShaderPlan, out: &mut String) {
    if !plan.peels() {
        return;
    }
    out.push_str("#extension GL_ARB_texture_rectangle : enable\nuniform vec4 texturesize;\n");
    match plan.hints.depth_compare {
        DepthCompare::ShadowSampler => out.push_str("uniform sampler2DRectShadow samplertex;\n"),
        DepthCompare::Manual => out.push_str("uniform sampler2DRect samplertex;\n"),
    }
}

/// Perspective divide of a clip-space varying into window depth.
fn eye_space(clip: &str, out: &mut String) {
    out.push_str(&format!(
        "  perspective = 1.0 / {clip}.w;\n  \
         eyespaceCoord = {clip};\n  \
         eyespaceCoord = eyespaceCoord * perspective * 0.5 + 0.5;\n"
    ));
}

fn sampler_declaration(dimension: u32, name: &str, out: &mut String) {
    out.push_str(&format!("uniform sampler{dimension}D {name};\n"));
}

impl DialectWriter for GlslWriter {
    fn dialect(&self) -> Dialect {
        Dialect::Modern
    }

    // ------------------------------------------------------------------------
    // Gouraud
    // ------------------------------------------------------------------------

    fn gouraud_vertex_header(&self, plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "//GOURAUDSHADING_VERTEX_SHADER\n\n\
             varying vec4 NewCoord;\n\
             varying vec3 eyeNormal, lightVec, diffuse;\n",
        );
        texture_scaling_uniform(plan, out);
    }

    fn gouraud_vertex_lighting(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "\nvoid main()\n{\n  \
             vec4 eyeVertex, finalCol;\n  \
             float NdotHV;\n  \
             float Len, attenuation;\n  \
             eyeVertex = gl_ModelViewMatrix * gl_Vertex;\n  \
             eyeNormal = normalize(gl_NormalMatrix * gl_Normal);\n  \
             lightVec = gl_LightSource[0].position.xyz - eyeVertex.xyz;\n  \
             Len = length(lightVec);\n  \
             lightVec = normalize(lightVec);\n  \
             attenuation = 1.0 / (gl_LightSource[0].quadraticAttenuation * Len * Len +\n    \
             gl_LightSource[0].constantAttenuation +\n    \
             Len * gl_LightSource[0].linearAttenuation);\n  \
             diffuse = vec3(gl_LightSource[0].diffuse * gl_Color * attenuation);\n  \
             NdotHV = abs(dot(eyeNormal, gl_LightSource[0].halfVector.xyz));\n  \
             finalCol = gl_FrontLightProduct[0].ambient\n    \
             + pow(NdotHV, gl_FrontMaterial.shininess) * gl_LightSource[0].specular\n    \
             * gl_FrontMaterial.specular;\n  \
             finalCol = finalCol * attenuation + gl_FrontMaterial.emission\n    \
             + gl_FrontMaterial.ambient * gl_LightModel.ambient;\n  \
             finalCol.a = gl_LightSource[0].diffuse.a * gl_Color.a;\n",
        );
    }

    fn gouraud_vertex_end(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "  gl_FrontColor = finalCol;\n  \
             gl_BackColor = finalCol;\n  \
             NewCoord = ftransform();\n  \
             gl_Position = NewCoord;\n\
             }\n",
        );
    }

    fn gouraud_fragment_header(&self, plan: &ShaderPlan, out: &mut String) {
        out.push_str("//fragment shader\n");
        peel_declarations(plan, out);
        if let Some(colour) = plan.colour {
            sampler_declaration(colour.dimension, "texture0", out);
        }
        out.push_str(
            "varying vec4 NewCoord;\n\
             varying vec3 eyeNormal, lightVec, diffuse;\n\n\
             void main()\n{\n  \
             float perspective, texel, NdotL;\n  \
             vec4 tex4coord, eyespaceCoord, finalCol;\n",
        );
    }

    fn gouraud_fragment_eye_space(&self, _plan: &ShaderPlan, out: &mut String) {
        eye_space("NewCoord", out);
    }

    fn gouraud_fragment_lighting(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "  NdotL = dot(normalize(eyeNormal), normalize(lightVec));\n  \
             if (!gl_FrontFacing)\n    \
             NdotL = abs(NdotL);\n  \
             finalCol.xyz = vec3(NdotL * diffuse + gl_Color.xyz);\n  \
             finalCol.a = gl_Color.a;\n",
        );
    }

    fn gouraud_colour_sample(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(colour) = plan.colour else { return };
        out.push_str(&format!(
            "  vec4 tex = texture{d}D(texture0, {t}(gl_TexCoord[0]));\n",
            d = colour.dimension,
            t = glsl_type(colour.dimension)
        ));
    }

    fn gouraud_combine(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(colour) = plan.colour else {
            out.push_str("  gl_FragColor = finalCol;\n");
            return;
        };
        let text = match (colour.decal, colour.components) {
            (false, 3) => "  gl_FragColor.rgb = vec3(finalCol * tex);\n  gl_FragColor.a = finalCol.a;\n",
            (false, 1) => "  gl_FragColor.rgb = finalCol.rgb * tex.x;\n  gl_FragColor.a = finalCol.a;\n",
            (false, 2) => "  gl_FragColor.rgb = finalCol.xyz * tex.x;\n  gl_FragColor.a = finalCol.a * tex.y;\n",
            (false, _) => "  gl_FragColor = finalCol * tex;\n",
            (true, 3) => "  gl_FragColor.rgb = tex.xyz;\n  gl_FragColor.a = gl_FrontMaterial.diffuse.w;\n",
            (true, 1) => "  gl_FragColor.rgb = tex.xxx;\n  gl_FragColor.a = gl_FrontMaterial.diffuse.w;\n",
            (true, 2) => "  gl_FragColor.xyz = vec3(tex.x);\n  gl_FragColor.w = tex.y;\n",
            (true, _) => "  gl_FragColor = tex;\n",
        };
        out.push_str(text);
    }

    fn gouraud_fragment_end(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("  gl_FragDepth = eyespaceCoord.z;\n}\n");
    }

    // ------------------------------------------------------------------------
    // Per-pixel vertex
    // ------------------------------------------------------------------------

    fn per_pixel_vertex_header(&self, plan: &ShaderPlan, out: &mut String) {
        out.push_str("//Vertex Shader\n#version 110\nvarying vec4 diffuse, ambientGlobal, ambient;\n");
        texture_scaling_uniform(plan, out);
        out.push_str("\nvoid main()\n{\n  vec3 pos;\n");
    }

    fn per_pixel_eye_vertex(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "  diffuse = gl_FrontMaterial.diffuse * gl_LightSource[0].diffuse;\n  \
             ambient = gl_FrontMaterial.ambient * gl_LightSource[0].ambient;\n  \
             ambientGlobal = gl_LightModel.ambient * gl_FrontMaterial.ambient;\n  \
             vec4 ecPos = gl_ModelViewMatrix * gl_Vertex;\n  \
             vec3 aux = gl_LightSource[0].position.xyz - ecPos.xyz;\n",
        );
    }

    fn tangent_space(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "\n  vec3 binormal = vec3(gl_MultiTexCoord1.yzxy * gl_Normal.zxyz) -\n         \
             vec3(gl_MultiTexCoord1.zxyz * gl_Normal.yzxy);\n  \
             vec3 temp = vec3(gl_MultiTexCoord1);\n  \
             mat3 TBN_Matrix = gl_NormalMatrix * mat3(temp, binormal, gl_Normal);\n  \
             gl_TexCoord[1].xyz = aux * TBN_Matrix;\n  \
             gl_TexCoord[2].xyz = vec3(-ecPos) * TBN_Matrix;\n",
        );
    }

    fn eye_normal(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "  gl_TexCoord[3].xyz = normalize((gl_ModelViewMatrixInverseTranspose * vec4(gl_Normal, 0.0)).xyz);\n  \
             gl_TexCoord[2].xyz = vec3(normalize(-ecPos.xyz));\n  \
             gl_TexCoord[1].xyz = aux;\n",
        );
    }

    fn clip_position(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("  gl_TexCoord[4] = gl_ModelViewProjectionMatrix * gl_Vertex;\n");
    }

    fn per_pixel_vertex_end(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "  gl_FrontColor = gl_Color;\n  \
             gl_BackColor = gl_Color;\n  \
             gl_FrontSecondaryColor = vec4(1.0);\n  \
             gl_BackSecondaryColor = vec4(0.0);\n  \
             gl_Position = gl_ModelViewProjectionMatrix * gl_Vertex;\n\
             }\n",
        );
    }

    // ------------------------------------------------------------------------
    // Per-pixel fragment
    // ------------------------------------------------------------------------

    fn per_pixel_fragment_header(&self, plan: &ShaderPlan, out: &mut String) {
        out.push_str("//fragment shader\n#version 110\n");
        peel_declarations(plan, out);
        if let Some(colour) = plan.colour {
            sampler_declaration(colour.dimension, "texture0", out);
        }
        if let Some(second) = plan.second {
            sampler_declaration(second.dimension, "texture1", out);
        }
        if let Some(lookup) = &plan.lookup {
            let dimension = match lookup.output {
                LookupOutput::PerComponent => 1,
                _ => lookup.input_count() as u32,
            };
            sampler_declaration(dimension, "texture1", out);
            out.push_str("uniform vec4 lookup_offsets, lookup_scales;\n");
        }
        if plan.lit_volume.is_some() {
            out.push_str("uniform vec4 texture_scaling, normal_scaling;\n");
        }
        out.push_str(
            "varying vec4 diffuse, ambientGlobal, ambient;\n\n\
             void main()\n{\n  \
             vec4 color;\n  \
             vec3 n, reflV, viewV, ldir;\n  \
             float NdotL, NdotHV, len;\n  \
             float att;\n\n",
        );
    }

    fn per_pixel_eye_space(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("  vec4 tex4coord, eyespaceCoord;\n  float perspective, texel;\n");
        eye_space("gl_TexCoord[4]", out);
    }

    fn per_pixel_colour_sample(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(colour) = plan.colour else { return };
        let tex_type = glsl_type(colour.components);
        out.push_str(&format!(
            "  {tex_type} tex = {tex_type}(texture{d}D(texture0, {coord}(gl_TexCoord[0])));\n",
            d = colour.dimension,
            coord = glsl_type(colour.dimension)
        ));
    }

    fn second_sample(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(second) = plan.second else { return };
        let swizzle = match second.dimension {
            1 => "x",
            2 => "xy",
            _ => "xyz",
        };
        out.push_str(&format!(
            "  vec3 tex2 = texture{d}D(texture1, gl_TexCoord[0].{swizzle}).rgb;\n",
            d = second.dimension
        ));
    }

    fn surface_normal(&self, plan: &ShaderPlan, out: &mut String) {
        if plan.bump_mapped() {
            out.push_str(
                "  //Expand the range of the normal texture\n  \
                 n = normalize(2.0 * tex2 - 1.0);\n  \
                 //Reverse the texture normal direction component if required\n  \
                 if (!gl_FrontFacing)\n    \
                 n.z = -1.0 * n.z;\n",
            );
        } else {
            out.push_str(
                "  n = normalize(gl_TexCoord[3].xyz);\n  \
                 if (!gl_FrontFacing)\n    \
                 n = -n;\n",
            );
        }
    }

    fn per_pixel_lighting(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str(
            "  color = gl_Color * gl_LightModel.ambient + gl_FrontMaterial.emission;\n  \
             len = length(vec3(gl_TexCoord[1]));\n  \
             NdotL = (dot(n, normalize(gl_TexCoord[1].xyz)));\n  \
             if (!gl_FrontFacing)\n    \
             NdotL = abs(NdotL);\n\n",
        );
        out.push_str(ATTENUATION);
        out.push_str(
            "  color += att * (diffuse * NdotL + ambient);\n\n  \
             reflV = reflect(-normalize(gl_TexCoord[1].xyz), n);\n  \
             NdotHV = max(dot(reflV, normalize(gl_TexCoord[2].xyz)), 0.0);\n  \
             color += att * gl_FrontMaterial.specular * gl_LightSource[0].specular *\n    \
             pow(NdotHV, gl_FrontMaterial.shininess);\n  \
             color.w = gl_FrontMaterial.diffuse.w;\n",
        );
    }

    fn per_pixel_combine(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(colour) = plan.colour else { return };
        let text = match (colour.decal, colour.components) {
            (false, 3) => "  color.xyz = color.xyz * tex.xyz;\n",
            (false, 1) => "  color.xyz = color.xyz * tex;\n",
            (false, 2) => "  color.xyz = color.xyz * tex.x;\n  color.w = color.w * tex.y;\n",
            (false, _) => "  color = color * tex;\n",
            (true, 3) => "  color.xyz = tex.xyz;\n  color.w = gl_FrontMaterial.diffuse.w;\n",
            (true, 1) => "  color.xyz = vec3(tex);\n  color.w = gl_FrontMaterial.diffuse.w;\n",
            (true, 2) => "  color.xyz = tex.xxx;\n  color.w = tex.y;\n",
            (true, _) => "  color = tex;\n",
        };
        out.push_str(text);
    }

    fn colour_lookup(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(lookup) = &plan.lookup else { return };
        let inputs = lookup.input_count();
        out.push_str(
            "  //Offset and scale to counteract effect of linear interpolation\n  \
             //starting at the middle of the first texel and finishing in the\n  \
             //middle of the last texel\n",
        );
        out.push_str(&format!(
            "  vec4 offsetcolour = color.{} * lookup_scales + lookup_offsets;\n",
            lookup.padded_swizzle()
        ));
        if inputs == 1 {
            out.push_str("  vec4 dependentlookup = texture1D(texture1, float(offsetcolour));\n");
        } else {
            out.push_str(&format!(
                "  vec4 dependentlookup = texture{inputs}D(texture1, vec{inputs}(offsetcolour));\n"
            ));
        }
        match lookup.output {
            LookupOutput::Colour => out.push_str("  color.rgb = dependentlookup.rgb;\n"),
            LookupOutput::Alpha => out.push_str("  color.w = color.w * dependentlookup.r;\n"),
            LookupOutput::ColourAndAlpha => out.push_str("  color = dependentlookup;\n"),
            LookupOutput::PerComponent => {}
        }
    }

    fn component_lookup(&self, plan: &ShaderPlan, out: &mut String) {
        let Some(lookup) = &plan.lookup else { return };
        out.push_str(
            "  //Offset and scale to counteract effect of linear interpolation\n  \
             //starting at the middle of the first texel and finishing in the\n  \
             //middle of the last texel\n  \
             float offsetcolour;\n  \
             vec4 dependentlookup;\n",
        );
        for channel in lookup.swizzle().chars() {
            out.push_str(&format!(
                "  offsetcolour = color.{channel} * lookup_scales.x + lookup_offsets.x;\n  \
                 dependentlookup = texture1D(texture1, offsetcolour);\n  \
                 color.{channel} = dependentlookup.r;\n"
            ));
        }
    }

    fn lit_volume(&self, plan: &ShaderPlan, out: &mut String) {
        let (Some(volume), Some(colour)) = (plan.lit_volume, plan.colour) else {
            return;
        };
        out.push_str("  vec4 unlitColour = color;\n");
        match volume.normal {
            VolumeNormal::IntensityTexture => out.push_str("  n = 2.0 * tex.gba - 1.0;\n"),
            VolumeNormal::FiniteDifference => {
                let d = colour.dimension;
                let coord = glsl_type(d);
                out.push_str(
                    "//Calculate a finite difference normal based on the magnitude of texture components used.\n  \
                     vec4 position_up, position_down, tex_up, tex_down;\n  \
                     n = vec3(0.0);\n",
                );
                for (axis, label) in AXIS_LABELS.iter().enumerate().take(d as usize) {
                    let step = |i: usize| i32::from(i == axis);
                    out.push_str(&format!(
                        "  vec4 stencil_{label}up = vec4({}.0, {}.0, {}.0, 0.0);\n  \
                         position_up = stencil_{label}up * texture_scaling + gl_TexCoord[0];\n  \
                         tex_up = texture{d}D(texture0, {coord}(position_up));\n  \
                         vec4 stencil_{label}down = vec4({}.0, {}.0, {}.0, 0.0);\n  \
                         position_down = stencil_{label}down * texture_scaling + gl_TexCoord[0];\n  \
                         tex_down = texture{d}D(texture0, {coord}(position_down));\n",
                        step(0),
                        step(1),
                        step(2),
                        -step(0),
                        -step(1),
                        -step(2),
                    ));
                    if matches!(colour.components, 3 | 4) {
                        out.push_str(&format!(
                            "  n.{label} = sqrt(dot(vec3(tex_up - tex_down), vec3(tex_up - tex_down)));\n"
                        ));
                    } else {
                        out.push_str(&format!("  n.{label} = tex_up.r - tex_down.r;\n"));
                    }
                }
                out.push_str("  n = n * vec3(normal_scaling);\n");
            }
        }
        out.push_str(
            "  vec3 eyeNormal = gl_NormalMatrix * n;\n  \
             if (!gl_FrontFacing)\n    \
             eyeNormal.z = -1.0 * eyeNormal.z;\n  \
             float normalMag = dot(eyeNormal, eyeNormal);\n  \
             eyeNormal = normalize(eyeNormal);\n  \
             len = length(vec3(gl_TexCoord[1]));\n",
        );
        out.push_str(ATTENUATION);
        out.push_str(
            "  NdotL = max(dot(eyeNormal, normalize(gl_TexCoord[1].xyz)), 0.0);\n  \
             reflV = reflect(-normalize(gl_TexCoord[1].xyz), eyeNormal);\n  \
             NdotHV = max(dot(reflV, normalize(gl_TexCoord[2].xyz)), 0.0);\n  \
             color = unlitColour * (gl_LightModel.ambient\n    \
             + att * (NdotL * gl_LightSource[0].diffuse + gl_LightSource[0].ambient))\n    \
             + att * gl_FrontMaterial.specular * gl_LightSource[0].specular\n    \
             * pow(NdotHV, gl_FrontMaterial.shininess)\n    \
             + gl_FrontMaterial.emission;\n",
        );
        if volume.scale_alpha {
            out.push_str("  color.w = unlitColour.w * normalMag;\n");
        } else {
            out.push_str("  color.w = unlitColour.w;\n");
        }
    }

    fn depth_write(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("  gl_FragDepth = eyespaceCoord.z;\n");
    }

    fn per_pixel_fragment_end(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("  gl_FragColor = color;\n}\n");
    }

    // ------------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------------

    fn texture_coordinates(&self, _plan: &ShaderPlan, out: &mut String) {
        out.push_str("  gl_TexCoord[0] = texture_scaling * gl_MultiTexCoord0;\n");
    }

    fn depth_peel(&self, plan: &ShaderPlan, out: &mut String) {
        out.push_str("  tex4coord = texturesize * eyespaceCoord.xyzx;\n");
        match plan.hints.depth_compare {
            DepthCompare::ShadowSampler => {
                if plan.hints.has_bias() {
                    out.push_str(&format!(
                        "  tex4coord.z = gl_FragCoord.z {:+};\n",
                        plan.hints.depth_bias
                    ));
                }
                out.push_str(
                    "  texel = shadow2DRect(samplertex, vec3(tex4coord)).r;\n  \
                     if (texel < 0.5)\n  {\n    discard;\n  }\n",
                );
            }
            DepthCompare::Manual => {
                if plan.hints.has_bias() {
                    out.push_str(&format!(
                        "  tex4coord.z = gl_FragCoord.z {:+};\n",
                        plan.hints.depth_bias
                    ));
                } else {
                    out.push_str("  tex4coord.z = gl_FragCoord.z;\n");
                }
                out.push_str(
                    "  texel = texture2DRect(samplertex, tex4coord.xy).x;\n  \
                     if (tex4coord.z <= texel)\n  {\n    discard;\n  }\n",
                );
            }
        }
    }
}
