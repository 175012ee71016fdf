use strata_service_state::radio::{raw_reply, RawReply};
use strata_service_state::state::RadioTechnology;

/// Builder for a full voice-registration reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceReply {
    pub reg_code: i32,
    pub technology: RadioTechnology,
    pub base_station_id: i32,
    pub latitude: i32,
    pub longitude: i32,
    pub css: bool,
    pub system_id: i32,
    pub network_id: i32,
    pub roaming_indicator: i32,
}

impl VoiceReply {
    /// Registered on the home network, roaming indicator off.
    pub fn home(technology: RadioTechnology) -> Self {
        VoiceReply {
            reg_code: 1,
            technology,
            base_station_id: 1,
            latitude: 100,
            longitude: 200,
            css: false,
            system_id: 1,
            network_id: 1,
            roaming_indicator: 1,
        }
    }

    pub fn roaming(technology: RadioTechnology) -> Self {
        VoiceReply {
            reg_code: 5,
            roaming_indicator: 0,
            ..Self::home(technology)
        }
    }

    pub fn out_of_service() -> Self {
        VoiceReply {
            reg_code: 0,
            ..Self::home(RadioTechnology::Unknown)
        }
    }

    pub fn with_system(mut self, sid: i32, nid: i32) -> Self {
        self.system_id = sid;
        self.network_id = nid;
        self
    }

    pub fn with_base_station(mut self, id: i32) -> Self {
        self.base_station_id = id;
        self
    }

    /// Reported without any position: ids unknown, coordinates 0,0.
    pub fn without_location(mut self) -> Self {
        self.base_station_id = -1;
        self.latitude = 0;
        self.longitude = 0;
        self.system_id = -1;
        self.network_id = -1;
        self
    }

    pub fn with_css(mut self, css: bool) -> Self {
        self.css = css;
        self
    }

    pub fn fields(&self) -> RawReply {
        let css = if self.css { "1" } else { "0" };
        raw_reply(&[
            self.reg_code.to_string().as_str(),
            "",
            "",
            self.technology.code().to_string().as_str(),
            self.base_station_id.to_string().as_str(),
            self.latitude.to_string().as_str(),
            self.longitude.to_string().as_str(),
            css,
            self.system_id.to_string().as_str(),
            self.network_id.to_string().as_str(),
            self.roaming_indicator.to_string().as_str(),
            "1",
            "1",
            "0",
        ])
    }
}

pub fn data_reply(reg_code: i32, technology: RadioTechnology) -> RawReply {
    raw_reply(&[
        reg_code.to_string(),
        String::new(),
        String::new(),
        technology.code().to_string(),
    ])
}

pub fn operator_reply(long: &str, short: &str, numeric: &str) -> RawReply {
    raw_reply(&[long, short, numeric])
}
