/// Generates a model struct along with its string ID newtype and builder.
///
/// Every model gets `id`, `active`, `created`, `updated`, and `deleted`
/// fields on top of whatever fields are passed in.
#[macro_export]
macro_rules! bank_model {
    (
        $(#[$struct_meta:meta])*
        pub struct $name:ident {
            $($fields:tt)*
        }
        $id:ident
        $builder:ident

    ) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $id(String);

        impl $id {
            pub fn new<T: Into<String>>(id: T) -> Self {
                Self(id.into())
            }

            /// Create a random (v4 uuid) ID.
            pub fn create() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Return a string ref for this ID
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::convert::From<$id> for String {
            fn from(id: $id) -> Self {
                let $id(val) = id;
                val
            }
        }

        impl std::convert::From<String> for $id {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl std::convert::From<&str> for $id {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl std::fmt::Display for $id {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        $(#[$struct_meta])*
        #[derive(Clone, Debug, PartialEq, getset::Getters, getset::Setters, derive_builder::Builder, serde::Serialize, serde::Deserialize)]
        #[builder(pattern = "owned", setter(into))]
        #[getset(get = "pub", set = "pub(crate)")]
        pub struct $name {
            id: $id,
            $($fields)*
            #[builder(default)]
            active: bool,
            created: chrono::DateTime<chrono::Utc>,
            updated: chrono::DateTime<chrono::Utc>,
            #[builder(setter(strip_option), default)]
            #[serde(skip_serializing_if = "Option::is_none", default)]
            deleted: Option<chrono::DateTime<chrono::Utc>>,
        }

        impl $name {
            pub fn builder() -> $builder {
                $builder::default()
            }

            pub fn is_active(&self) -> bool {
                self.active && !self.is_deleted()
            }

            pub fn is_deleted(&self) -> bool {
                self.deleted.is_some()
            }
        }
    }
}
