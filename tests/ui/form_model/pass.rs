use ruleset_validation::form::{FieldValue, FormModel};

#[derive(Clone, ruleset_validation::form::FormModel)]
struct DemoForm {
    email: String,
    age: Option<u32>,
}

fn main() {
    let fields = DemoForm::fields();
    assert_eq!(fields.email().as_str(), "email");
    assert_eq!(fields.age().as_str(), "age");

    let model = DemoForm {
        email: "a@rule.set".to_string(),
        age: None,
    };
    let values = model.view_values();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].0, fields.email());
    assert_eq!(values[0].1, FieldValue::from("a@rule.set"));
    assert_eq!(values[1].1, FieldValue::Undefined);
}
