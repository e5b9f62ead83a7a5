use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The record every extraction produces
///
/// Field docs double as the tool parameter descriptions the model sees.
/// Absent values are empty strings or empty lists, never missing keys.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerOpportunity {
    /// Short title of the opportunity as shown on the page.
    pub title: String,

    /// Full name of the organization running the opportunity; prefer the most prominent branding on the page.
    pub organization: String,

    /// 1 to 3 tags from: environment, food security, education, community, healthcare, animal welfare, disaster relief, homeless support, advocacy.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Street address, city and state only. Empty if the page gives none.
    #[serde(default)]
    pub location: String,

    /// Important details that do not fit the other fields. Empty if none.
    #[serde(default)]
    pub description: String,

    /// 3 to 10 word specific activity summary, e.g. "environmental cleanup and service projects". Avoid generic phrasing.
    #[serde(default)]
    pub activity_type: String,

    /// "F" for flexible or drop-in; otherwise the recurring days as abbreviations such as "M, W, F". Put one-off dates in description.
    #[serde(default)]
    pub time_slot: String,

    /// Any of: "individual drop-in welcome", "individual application required", "corporate group drop-in welcome", "corporate group application required".
    #[serde(default)]
    pub slot_availability: Vec<String>,

    /// First date of the opportunity as YYYY-MM-DD. Empty if not stated.
    #[serde(default)]
    pub date_start: String,

    /// Last date of the opportunity as YYYY-MM-DD. Empty if not stated.
    #[serde(default)]
    pub date_end: String,

    #[schemars(skip)]
    #[serde(default)]
    pub url: String,

    /// Most relevant contact email. Empty if none.
    #[serde(default)]
    pub contact_email: String,

    /// Primary contact phone number. Empty if none.
    #[serde(default)]
    pub contact_phone: String,
}
