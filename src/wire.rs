use tokio_util::bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::trace;

/// A single byte to be written at a single telegram offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Command {
    pub index: u8,
    pub value: u8,
}

impl Command {
    pub const fn new(index: u8, value: u8) -> Self {
        Self { index, value }
    }

    /// The frame written to the appliance's write characteristic.
    pub const fn to_frame(&self) -> [u8; 8] {
        [0x02, 0x04, 0x00, 0x04, 0x00, self.index, 0x01, self.value]
    }

    /// Frame written right after connecting to make the appliance start notifying its state.
    pub const fn initial_read_request() -> [u8; 8] {
        Self::new(0x1a, 0x03).to_frame()
    }

    /// The cloud equivalent of [`Command::to_frame`], published to
    /// [`Command::cloud_topic`].
    pub fn cloud_message(&self, appliance_id: &str) -> CloudWrite {
        CloudWrite {
            kind: "write",
            prm: format!("[{},{}]", self.index, self.value),
            appliance_id: is_tuya(appliance_id).then(|| appliance_id.to_string()),
        }
    }

    pub fn cloud_topic(appliance_id: &str) -> String {
        let suffix = if is_tuya(appliance_id) { "/tuyacommand" } else { "/command" };
        format!("{appliance_id}{suffix}")
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.value)
    }
}

/// Tuya-relayed appliances are identified by their id prefix and need to be addressed
/// explicitly in every message.
fn is_tuya(appliance_id: &str) -> bool {
    appliance_id.starts_with('T')
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudWrite {
    #[serde(rename = "type")]
    kind: &'static str,
    prm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    appliance_id: Option<String>,
}

pub struct WriteCodec {}

impl Encoder<&Command> for WriteCodec {
    type Error = std::io::Error;

    fn encode(&mut self, command: &Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&command.to_frame());
        trace!(message = "sending encoded", %command, buffer = ?dst);
        Ok(())
    }
}
