use serde::{Deserialize, Deserializer, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Lab,
    Classroom,
    EventHall,
    MeetingRoom,
    Computer,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Lab => "LAB",
            ResourceType::Classroom => "CLASSROOM",
            ResourceType::EventHall => "EVENT_HALL",
            ResourceType::MeetingRoom => "MEETING_ROOM",
            ResourceType::Computer => "COMPUTER",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Active => "ACTIVE",
            ResourceStatus::Inactive => "INACTIVE",
            ResourceStatus::Maintenance => "MAINTENANCE",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Resource {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub capacity: u32,
    pub status: ResourceStatus,
    pub lab_in_charge: Option<i64>,
    pub assigned_staff: Option<i64>,
}

/// Body of resource create, update and partial update.
///
/// For the assignee fields, an absent key is `None` and leaves the current
/// value alone, while an explicit `null` is `Some(None)` and clears it.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ResourcePayload {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ResourceType>,
    pub capacity: Option<u32>,
    pub status: Option<ResourceStatus>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub lab_in_charge: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<Option<i64>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResourceResponse {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub capacity: u32,
    pub status: ResourceStatus,
    pub lab_in_charge: Option<i64>,
    pub lab_in_charge_name: Option<String>,
    pub assigned_staff: Option<i64>,
    pub assigned_staff_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_assignee_is_kept_apart_from_a_missing_one() {
        let cleared: ResourcePayload = serde_json::from_str(r#"{"lab_in_charge": null}"#).unwrap();
        assert_eq!(cleared.lab_in_charge, Some(None));
        assert_eq!(cleared.assigned_staff, None);

        let set: ResourcePayload = serde_json::from_str(r#"{"assigned_staff": 2}"#).unwrap();
        assert_eq!(set.assigned_staff, Some(Some(2)));
    }

    #[test]
    fn untouched_assignees_are_left_out_of_the_body() {
        let body = serde_json::to_value(ResourcePayload {
            status: Some(ResourceStatus::Maintenance),
            lab_in_charge: Some(None),
            ..Default::default()
        })
        .unwrap();
        assert!(body.get("assigned_staff").is_none());
        assert!(body["lab_in_charge"].is_null());
        assert!(body.as_object().unwrap().contains_key("lab_in_charge"));
    }
}
