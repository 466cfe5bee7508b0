//! Runtime-shaped uniform values and their packing into a program's block.
//!
//! Providers hand the pipeline a bag of `name -> value` pairs without any
//! static typing. Each value is classified by shape into one of the
//! [`UploadOp`]s, matched against the reflected [`UniformLayout`] of the
//! program being drawn and written at the member's std140 offset.

/// A uniform value as supplied by a pass provider.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Scalar(f32),
    Vector(Vec<f32>),
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Scalar(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        UniformValue::Vector(value.to_vec())
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        UniformValue::Vector(value.to_vec())
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        UniformValue::Vector(value.to_vec())
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(value: Vec<f32>) -> Self {
        UniformValue::Vector(value)
    }
}

/// Ordered set of named uniform values for one pass.
///
/// Setting a name twice replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Uniforms {
    values: Vec<(String, UniformValue)>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<UniformValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The closed set of upload operations a value can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UploadOp {
    /// One-float upload.
    Float(f32),
    /// N-float vector upload, `1 <= len <= 4`; unused lanes are zero.
    Vector { len: u32, data: [f32; 4] },
}

impl UploadOp {
    /// Classifies a value by its runtime shape. Vectors that are empty or
    /// longer than four components have no upload operation.
    pub fn from_value(value: &UniformValue) -> Option<Self> {
        match value {
            UniformValue::Scalar(value) => Some(UploadOp::Float(*value)),
            UniformValue::Vector(components) if (1..=4).contains(&components.len()) => {
                let mut data = [0.0; 4];
                data[..components.len()].copy_from_slice(components);
                Some(UploadOp::Vector {
                    len: components.len() as u32,
                    data,
                })
            }
            UniformValue::Vector(_) => None,
        }
    }

    pub fn components(&self) -> u32 {
        match self {
            UploadOp::Float(_) => 1,
            UploadOp::Vector { len, .. } => *len,
        }
    }

    fn write(&self, bytes: &mut [u8], offset: usize) {
        let floats: &[f32] = match self {
            UploadOp::Float(value) => std::slice::from_ref(value),
            UploadOp::Vector { len, data } => &data[..*len as usize],
        };
        for (index, value) in floats.iter().enumerate() {
            let start = offset + index * 4;
            bytes[start..start + 4].copy_from_slice(&value.to_le_bytes());
        }
    }
}

/// One reflected member of a program's uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub offset: u32,
    pub components: u32,
}

/// Name to location lookup for a program, cached at link time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformLayout {
    slots: Vec<UniformSlot>,
    size: u32,
}

impl UniformLayout {
    pub(crate) fn new(slots: Vec<UniformSlot>, size: u32) -> Self {
        Self { slots, size }
    }

    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    /// Byte size of the block as declared by the shader.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Size of the GPU buffer backing this block. Never zero.
    pub(crate) fn buffer_size(&self) -> u64 {
        u64::from(self.size.max(16).next_multiple_of(16))
    }

    /// Packs `uniforms` into a fresh zeroed block for one pass.
    pub fn stage(&self, uniforms: &Uniforms) -> StagedUniforms {
        let mut bytes = vec![0u8; self.buffer_size() as usize];
        let mut outcomes = Vec::with_capacity(uniforms.len());

        for (name, value) in uniforms.iter() {
            let outcome = match (self.slot(name), UploadOp::from_value(value)) {
                (None, _) => {
                    tracing::debug!(uniform = name, "no such uniform in program; skipped");
                    BindOutcome::Unknown {
                        name: name.to_string(),
                    }
                }
                (Some(_), None) => {
                    let len = match value {
                        UniformValue::Vector(components) => components.len(),
                        UniformValue::Scalar(_) => 1,
                    };
                    tracing::warn!(uniform = name, len, "vector uniforms must have 1 to 4 components; skipped");
                    BindOutcome::Unsupported {
                        name: name.to_string(),
                        len,
                    }
                }
                (Some(slot), Some(op)) if op.components() != slot.components => {
                    tracing::warn!(
                        uniform = name,
                        expected = slot.components,
                        found = op.components(),
                        "uniform value does not match declared shape; skipped"
                    );
                    BindOutcome::ShapeMismatch {
                        name: name.to_string(),
                        expected: slot.components,
                        found: op.components(),
                    }
                }
                (Some(slot), Some(op)) => {
                    op.write(&mut bytes, slot.offset as usize);
                    BindOutcome::Bound {
                        name: name.to_string(),
                        op,
                    }
                }
            };
            outcomes.push(outcome);
        }

        StagedUniforms { bytes, outcomes }
    }
}

/// What happened to one supplied uniform while staging a pass.
#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    Bound { name: String, op: UploadOp },
    Unknown { name: String },
    ShapeMismatch { name: String, expected: u32, found: u32 },
    Unsupported { name: String, len: usize },
}

/// A packed uniform block ready for upload.
#[derive(Debug, Clone)]
pub struct StagedUniforms {
    bytes: Vec<u8>,
    outcomes: Vec<BindOutcome>,
}

impl StagedUniforms {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn outcomes(&self) -> &[BindOutcome] {
        &self.outcomes
    }

    pub fn bound(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, BindOutcome::Bound { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> UniformLayout {
        UniformLayout::new(
            vec![
                UniformSlot {
                    name: "uSigma".into(),
                    offset: 0,
                    components: 1,
                },
                UniformSlot {
                    name: "uDirection".into(),
                    offset: 8,
                    components: 2,
                },
                UniformSlot {
                    name: "inputLevels".into(),
                    offset: 16,
                    components: 3,
                },
                UniformSlot {
                    name: "uTint".into(),
                    offset: 32,
                    components: 4,
                },
            ],
            48,
        )
    }

    fn float_at(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn values_dispatch_by_shape() {
        assert_eq!(
            UploadOp::from_value(&UniformValue::Scalar(2.0)),
            Some(UploadOp::Float(2.0))
        );
        for len in 1..=4usize {
            let value = UniformValue::Vector(vec![1.0; len]);
            let op = UploadOp::from_value(&value).expect("valid vector");
            assert!(matches!(op, UploadOp::Vector { len: l, .. } if l as usize == len));
        }
        assert_eq!(UploadOp::from_value(&UniformValue::Vector(vec![])), None);
        assert_eq!(UploadOp::from_value(&UniformValue::Vector(vec![0.0; 5])), None);
    }

    #[test]
    fn staging_writes_each_member_at_its_offset() {
        let uniforms = Uniforms::new()
            .with("uSigma", 4.0)
            .with("uDirection", [1.0, 0.0])
            .with("inputLevels", [0.1, 0.5, 0.9])
            .with("uTint", [0.25, 0.5, 0.75, 1.0]);

        let staged = layout().stage(&uniforms);
        let bytes = staged.bytes();
        assert_eq!(bytes.len(), 48);
        assert_eq!(staged.bound(), 4);
        assert_eq!(float_at(bytes, 0), 4.0);
        assert_eq!(float_at(bytes, 8), 1.0);
        assert_eq!(float_at(bytes, 12), 0.0);
        assert_eq!(float_at(bytes, 16), 0.1);
        assert_eq!(float_at(bytes, 24), 0.9);
        assert_eq!(float_at(bytes, 44), 1.0);
        assert!(matches!(
            staged.outcomes()[0],
            BindOutcome::Bound {
                op: UploadOp::Float(_),
                ..
            }
        ));
        assert!(matches!(
            staged.outcomes()[2],
            BindOutcome::Bound {
                op: UploadOp::Vector { len: 3, .. },
                ..
            }
        ));
    }

    #[test]
    fn unknown_names_are_skipped() {
        let staged = layout().stage(&Uniforms::new().with("uMissing", 1.0).with("uSigma", 2.0));
        assert_eq!(
            staged.outcomes()[0],
            BindOutcome::Unknown {
                name: "uMissing".into()
            }
        );
        assert_eq!(staged.bound(), 1);
        assert_eq!(float_at(staged.bytes(), 0), 2.0);
    }

    #[test]
    fn mismatched_shapes_leave_member_zeroed() {
        let staged = layout().stage(
            &Uniforms::new()
                .with("uDirection", 3.0)
                .with("uSigma", vec![1.0, 2.0, 3.0, 4.0, 5.0]),
        );
        assert!(matches!(
            staged.outcomes()[0],
            BindOutcome::ShapeMismatch {
                expected: 2,
                found: 1,
                ..
            }
        ));
        assert!(matches!(
            staged.outcomes()[1],
            BindOutcome::Unsupported { len: 5, .. }
        ));
        assert!(staged.bytes().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn single_component_vector_binds_to_float_member() {
        let staged = layout().stage(&Uniforms::new().with("uSigma", vec![3.0]));
        assert_eq!(staged.bound(), 1);
        assert_eq!(float_at(staged.bytes(), 0), 3.0);
    }

    #[test]
    fn setting_a_name_twice_replaces_it() {
        let mut uniforms = Uniforms::new().with("uSigma", 1.0);
        uniforms.set("uSigma", 6.0);
        assert_eq!(uniforms.len(), 1);
        assert_eq!(uniforms.get("uSigma"), Some(&UniformValue::Scalar(6.0)));
    }

    #[test]
    fn empty_layout_still_has_a_buffer() {
        let layout = UniformLayout::empty();
        assert_eq!(layout.buffer_size(), 16);
        assert_eq!(layout.stage(&Uniforms::new()).bytes().len(), 16);
    }
}
