//! `QUANTITY` values as encoded by the execution JSON-RPC API.

use ethereum_types::U64;
use serde::{Deserialize as _, Deserializer, Serialize as _, Serializer};

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    U64::deserialize(deserializer).map(|quantity| quantity.as_u64())
}

pub fn serialize<S: Serializer>(number: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    U64::from(*number).serialize(serializer)
}

pub mod option {
    use ethereum_types::U64;
    use serde::{Deserialize as _, Deserializer, Serialize as _, Serializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        Option::<U64>::deserialize(deserializer)
            .map(|quantity| quantity.as_ref().map(U64::as_u64))
    }

    pub fn serialize<S: Serializer>(number: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        number.map(U64::from).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(PartialEq, Eq, Debug, Deserialize, Serialize)]
    struct Quantities {
        #[serde(with = "super")]
        required: u64,
        #[serde(with = "super::option", default)]
        optional: Option<u64>,
    }

    #[test]
    fn quantities_are_prefixed_hex() -> anyhow::Result<()> {
        let quantities = Quantities {
            required: 0x1d243,
            optional: None,
        };

        let json = serde_json::to_value(&quantities)?;

        assert_eq!(json, json!({ "required": "0x1d243", "optional": null }));
        assert_eq!(serde_json::from_value::<Quantities>(json)?, quantities);

        let json = json!({ "required": "0x0" });

        assert_eq!(
            serde_json::from_value::<Quantities>(json)?,
            Quantities {
                required: 0,
                optional: None,
            },
        );

        Ok(())
    }
}
