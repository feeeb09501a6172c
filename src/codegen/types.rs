//! Mapping from abstract field types to Go storage types.

use crate::schema::FieldType;

/// Map an abstract field type to the Go type used in generated records.
///
/// Pure and total: identical input always yields identical output.
/// References map to the unsigned integer id of the target row; arrays map
/// to a slice of the mapped element type.
pub fn go_type(field_type: &FieldType) -> String {
    match field_type {
        FieldType::String => "string".to_string(),
        FieldType::Number => "float64".to_string(),
        FieldType::Boolean => "bool".to_string(),
        FieldType::Date => "time.Time".to_string(),
        FieldType::Reference => "uint".to_string(),
        FieldType::Array(element) => format!("[]{}", go_type(element)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_mappings() {
        assert_eq!(go_type(&FieldType::String), "string");
        assert_eq!(go_type(&FieldType::Number), "float64");
        assert_eq!(go_type(&FieldType::Boolean), "bool");
        assert_eq!(go_type(&FieldType::Date), "time.Time");
        assert_eq!(go_type(&FieldType::Reference), "uint");
    }

    #[test]
    fn arrays_map_to_slices_of_mapped_element() {
        assert_eq!(go_type(&FieldType::array_of(FieldType::String)), "[]string");
        assert_eq!(go_type(&FieldType::array_of(FieldType::Reference)), "[]uint");
        assert_eq!(
            go_type(&FieldType::array_of(FieldType::array_of(FieldType::Number))),
            "[][]float64"
        );
    }
}
