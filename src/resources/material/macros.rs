// src/resources/material/macros.rs

/// Generates the colour and scalar attribute API of [`Material`](crate::resources::material::Material).
///
/// Every setter only touches the material when the value actually changes; a real
/// change bumps the version and returns the material to `NotCompiled`. Unit scalars
/// are range checked against [0, 1] and rejected without modification otherwise.
#[macro_export]
macro_rules! impl_material_api {
    (
        $struct_name:ident,
        // Colours: (field, setter, doc)
        colours: [ $(($c_field:ident, $c_setter:ident, $c_doc:expr)),* $(,)? ],
        // Unit scalars: (field, setter, attribute name, doc)
        scalars: [ $(($s_field:ident, $s_setter:ident, $s_name:expr, $s_doc:expr)),* $(,)? ]
    ) => {
        impl $struct_name {
            // --- Colour Accessors ---
            $(
                #[doc = $c_doc]
                #[must_use]
                pub fn $c_field(&self) -> glam::DVec3 {
                    self.$c_field
                }

                #[doc = $c_doc]
                pub fn $c_setter(&mut self, colour: glam::DVec3) {
                    if self.$c_field != colour {
                        self.$c_field = colour;
                        self.touch();
                    }
                }
            )*

            // --- Scalar Accessors ---
            $(
                #[doc = $s_doc]
                #[must_use]
                pub fn $s_field(&self) -> f64 {
                    self.$s_field
                }

                #[doc = $s_doc]
                ///
                /// Values outside [0, 1] are rejected and the stored value is kept.
                #[allow(clippy::float_cmp)]
                pub fn $s_setter(&mut self, value: f64) -> $crate::errors::Result<()> {
                    if !(0.0..=1.0).contains(&value) {
                        log::error!("Material {:?}: {} {} is out of range", self.name, $s_name, value);
                        return Err($crate::errors::ShaderError::ValueOutOfRange {
                            attribute: $s_name,
                            value,
                        });
                    }
                    if self.$s_field != value {
                        self.$s_field = value;
                        self.touch();
                    }
                    Ok(())
                }
            )*
        }
    };
}
