use super::value::{FieldName, FieldValue};

/// A typed form whose fields map onto named view values.
///
/// Usually derived with `#[derive(FormModel)]`, which also generates a
/// `<Model>Fields` accessor returning each field's [`FieldName`].
pub trait FormModel {
    type Fields;

    fn fields() -> Self::Fields;

    fn view_values(&self) -> Vec<(FieldName, FieldValue)>;
}
