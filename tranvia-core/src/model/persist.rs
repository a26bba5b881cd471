//! Versioned serialization of model object graphs
//!
//! Bundles are tagged with the build identifier so that data written by one
//! build is never silently reinterpreted by another. A round-trip through
//! [`VersionedBundle::to_writer`] and [`VersionedBundle::from_reader`] must
//! reproduce structurally equal data.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Short git identifier injected at build, falling back to the crate version.
pub fn build_identifier() -> &'static str {
    option_env!("TRANVIA_BUILD_COMMIT").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// A payload tagged with the build that wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedBundle<T> {
    pub version: String,
    pub payload: T,
}

impl<T: Serialize + DeserializeOwned> VersionedBundle<T> {
    pub fn new(payload: T) -> Self {
        VersionedBundle {
            version: build_identifier().to_string(),
            payload,
        }
    }

    pub fn to_writer<W: std::io::Write>(&self, writer: W) -> Result<(), Error> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read a bundle, rejecting payloads written by a different build.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, Error> {
        let bundle: VersionedBundle<T> = serde_json::from_reader(reader)?;
        if bundle.version != build_identifier() {
            return Err(Error::IncompatibleBundle {
                found: bundle.version,
                expected: build_identifier().to_string(),
            });
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransitDataBuilder;
    use crate::model::fares::{BLANK_FARE_ID, FareLegRule};

    #[test]
    fn round_trip_reproduces_equal_data() {
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let route = builder.add_route("r");
        builder
            .add_pattern(route, vec![a, b])
            .add_trip("t", vec![0, 300], vec![0, 300]);
        builder.add_transfer(a, b, 90);
        let network = builder.add_fare_network("n", true);
        builder.add_route_to_network(route, network);
        builder.add_fare_leg_rule(FareLegRule {
            network,
            from_stop: a as u32,
            to_stop: b as u32,
            order: 1,
            amount: 250,
            leg_group: BLANK_FARE_ID,
        });
        let data = builder.build().unwrap();

        let mut buffer = Vec::new();
        VersionedBundle::new(data.clone())
            .to_writer(&mut buffer)
            .unwrap();
        let restored: VersionedBundle<crate::model::TransitData> =
            VersionedBundle::from_reader(buffer.as_slice()).unwrap();
        assert_eq!(restored.payload, data);
    }

    #[test]
    fn mismatched_build_tag_is_rejected() {
        let bundle = VersionedBundle {
            version: "deadbee".to_string(),
            payload: vec![1u32, 2, 3],
        };
        let mut buffer = Vec::new();
        bundle.to_writer(&mut buffer).unwrap();
        let result = VersionedBundle::<Vec<u32>>::from_reader(buffer.as_slice());
        assert!(matches!(result, Err(crate::Error::IncompatibleBundle { .. })));
    }
}
