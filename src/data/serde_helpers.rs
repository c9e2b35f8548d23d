//! BSON representations for optional and repeated ids and timestamps.
//!
//! Single required values use the helpers shipped with `bson`; these cover the
//! `Option` and `Vec` shapes it doesn't.

pub use bson::serde_helpers::chrono_datetime_as_bson_datetime;
pub use bson::serde_helpers::uuid_1_as_binary;

pub mod uuid_option_as_binary {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(value: &Option<Uuid>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => bson::Uuid::from(*id).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Uuid>, D::Error> {
        Ok(Option::<bson::Uuid>::deserialize(deserializer)?.map(Uuid::from))
    }
}

pub mod uuid_vec_as_binary {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(value: &[Uuid], serializer: S) -> Result<S::Ok, S::Error> {
        value
            .iter()
            .map(|id| bson::Uuid::from(*id))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Uuid>, D::Error> {
        Ok(Vec::<bson::Uuid>::deserialize(deserializer)?
            .into_iter()
            .map(Uuid::from)
            .collect())
    }
}

pub mod chrono_option_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => bson::DateTime::from_chrono(*date).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|it| it.to_chrono()))
    }
}
