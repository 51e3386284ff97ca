use serde::{Deserialize, Serialize};

// Format config file carries backend format specific details.
pub const FORMAT_CONFIG_FILE: &str = "format.json";

// Version of the FormatMetaV1
pub const FORMAT_META_VERSION_V1: &str = "1";

// format.json currently has the format:
// {
//   "version": "1",
//   "format": "XXXXX",
//   "XXXXX": {
//
//   }
// }
// Here "XXXXX" depends on the backend, currently 'xl' and 'xl-single'.
// FormatMetaV1 is embedded by the backend format structs.

// Ideally we will never have a situation where we will have to change the
// fields of this struct and deal with related migration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatMetaV1 {
    // Version of the format config.
    pub version: String,
    // The backend format type.
    pub format: String,
    // The identifier for the deployment.
    #[serde(default)]
    pub id: String,
}
