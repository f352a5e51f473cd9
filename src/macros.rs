/// Implement [schemars::JsonSchema] items through a serde proxy type
///
/// Used by types which are (de)serialized with `into`/`try_from` a parameters struct.
macro_rules! json_schema {
    ($parameters: ty, $is_referenceable: expr) => {
        fn is_referenceable() -> bool {
            $is_referenceable
        }

        fn schema_name() -> String {
            <$parameters>::schema_name()
        }

        fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
            <$parameters>::json_schema(generator)
        }
    };
}
