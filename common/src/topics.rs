use crate::error::PayloadError;

pub const TOPIC_GROUP_EVENTS: &str = "/read/group/+/events/+";
pub const TOPIC_GROUP_ERRORS: &str = "/read/group/+/error/+";
pub const TOPIC_GROUP_COMMANDS: &str = "/write/group/+/commands";
pub const TOPIC_SWITCH_COMMANDS: &str = "/write/switch/commands";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Led,
    Sensor,
    Blind,
    Hvac,
    Nano,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Led => "led",
            Self::Sensor => "sensor",
            Self::Blind => "blind",
            Self::Hvac => "hvac",
            Self::Nano => "nano",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "led" => Some(Self::Led),
            "sensor" => Some(Self::Sensor),
            "blind" => Some(Self::Blind),
            "hvac" => Some(Self::Hvac),
            "nano" => Some(Self::Nano),
            _ => None,
        }
    }
}

/// Where an inbound message on the local broker has to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalRoute {
    Telemetry { group: i32, class: DeviceClass },
    DeviceError { group: i32, class: DeviceClass },
    GroupCommand { group: i32 },
    SwitchCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRoute {
    Setup,
    Update,
    Remove,
}

pub fn parse_local_topic(topic: &str) -> Result<LocalRoute, PayloadError> {
    if topic == TOPIC_SWITCH_COMMANDS {
        return Ok(LocalRoute::SwitchCommand);
    }

    let parts: Vec<&str> = topic.split('/').collect();
    let route = match parts.as_slice() {
        ["", "read", "group", id, kind, class] => {
            let group = parse_group(topic, id)?;
            let Some(class) = DeviceClass::parse(class).filter(|c| *c != DeviceClass::Led) else {
                return Err(PayloadError::UnknownTopic(topic.to_string()));
            };
            match *kind {
                "events" => LocalRoute::Telemetry { group, class },
                "error" => LocalRoute::DeviceError { group, class },
                _ => return Err(PayloadError::UnknownTopic(topic.to_string())),
            }
        }
        ["", "write", "group", id, "commands"] => LocalRoute::GroupCommand {
            group: parse_group(topic, id)?,
        },
        _ => return Err(PayloadError::UnknownTopic(topic.to_string())),
    };
    Ok(route)
}

pub fn parse_server_topic(topic: &str, mac: &str) -> Option<ServerRoute> {
    if topic == server_setup_topic(mac) {
        Some(ServerRoute::Setup)
    } else if topic == server_update_topic(mac) {
        Some(ServerRoute::Update)
    } else if topic == server_remove_topic(mac) {
        Some(ServerRoute::Remove)
    } else {
        None
    }
}

pub fn server_setup_topic(mac: &str) -> String {
    format!("/write/switch/{mac}/setup/config")
}

pub fn server_update_topic(mac: &str) -> String {
    format!("/write/switch/{mac}/update/settings")
}

pub fn server_remove_topic(mac: &str) -> String {
    format!("/remove/switch/{mac}/update/settings")
}

pub fn group_command_topic(group: i32) -> String {
    format!("/write/group/{group}/commands")
}

pub fn device_settings_topic(class: DeviceClass, mac: &str) -> String {
    format!("/write/{}/{mac}/update/settings", class.as_str())
}

fn parse_group(topic: &str, raw: &str) -> Result<i32, PayloadError> {
    raw.parse::<i32>().map_err(|source| PayloadError::InvalidGroup {
        topic: topic.to_string(),
        source,
    })
}
