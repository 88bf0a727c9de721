//! Accumulated RDS decoder state: every field the group/message decoders
//! populate, with per-field validity windows and error-correction
//! promotion rules.
//!
//! Ported from `hvylya::filters::fm::RdsState`/`RdsValue`: broadcast data
//! arrives a few bits at a time, re-transmitted every few seconds, and
//! each block carries its own error-correction status (see
//! [`crate::rds::ecc::RdsDecodingStatus`]). [`RdsValue`] is the
//! per-field accumulator that turns that stream of possibly-corrected,
//! possibly-repeated values into a single "currently valid" value: a
//! `Valid`-status block is trusted immediately, but a `Corrected` one is
//! only promoted to valid once it either matches the *previous*
//! `Corrected` block's raw bits (two independent corrections agreeing)
//! or matches a value that was already trusted -- a single error
//! correction is otherwise too likely to be wrong to act on. Each field
//! also expires (invalidates) if it hasn't been refreshed within its
//! [`ValueTag`]'s validity window, since RDS carries no explicit
//! "retract this" message.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::rds::ecc::RdsDecodingStatus;

/// Controls how long an [`RdsValue`] stays valid without a refresh.
/// Values taken from the reference's `RdsState::validity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTag {
    /// Static programme identity/configuration: PI, PTY, AFs, PS, ...
    Programme,
    /// Clock time: refreshed roughly once a minute by well-behaved
    /// broadcasters, same window as `Programme`.
    Clock,
    /// Free text: radiotext, PTY name.
    Text,
    /// Fast-changing flags: TA, music/speech, stereo indicator.
    Current,
}

impl ValueTag {
    pub fn validity_seconds(self) -> i64 {
        match self {
            ValueTag::Programme => 60,
            ValueTag::Clock => 60,
            ValueTag::Text => 30,
            ValueTag::Current => 15,
        }
    }
}

/// A single accumulated RDS field. See the module doc comment for the
/// promotion rule.
#[derive(Debug, Clone)]
pub struct RdsValue<T: Clone + PartialEq> {
    tag: ValueTag,
    has_corrected: bool,
    sent: bool,
    sent_value: Option<T>,
    last_value: Option<T>,
    last_check_data: u64,
    last_update: Option<DateTime<Utc>>,
}

impl<T: Clone + PartialEq> RdsValue<T> {
    pub fn new(tag: ValueTag) -> Self {
        RdsValue {
            tag,
            has_corrected: false,
            sent: false,
            sent_value: None,
            last_value: None,
            last_check_data: 0,
            last_update: None,
        }
    }

    /// Feeds a newly decoded block. `check_data` is the raw (pre-ECC)
    /// block bits this value was extracted from, used to recognize when
    /// two independent `Corrected` decodes agree.
    pub fn set(&mut self, value: T, check_data: u64, status: RdsDecodingStatus, now: DateTime<Utc>) {
        match status {
            RdsDecodingStatus::Uncorrectable => {}
            RdsDecodingStatus::Valid => {
                self.sent = true;
                self.sent_value = Some(value.clone());
                self.last_value = Some(value);
                self.last_check_data = check_data;
                self.last_update = Some(now);
                self.has_corrected = false;
            }
            RdsDecodingStatus::Corrected => {
                let promote = (self.has_corrected && self.last_check_data == check_data)
                    || (!self.has_corrected && self.sent && self.sent_value.as_ref() == Some(&value));
                self.last_value = Some(value.clone());
                self.last_check_data = check_data;
                self.has_corrected = true;
                if promote {
                    self.sent = true;
                    self.sent_value = Some(value);
                    self.last_update = Some(now);
                }
            }
        }
    }

    pub fn valid(&self) -> bool {
        self.sent
    }

    pub fn value(&self) -> Option<&T> {
        if self.sent {
            self.sent_value.as_ref()
        } else {
            None
        }
    }

    pub fn last_value(&self) -> Option<&T> {
        self.last_value.as_ref()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn invalidate(&mut self) {
        self.sent = false;
        self.has_corrected = false;
    }

    /// Invalidates (and reports `true`) if this value hasn't been
    /// refreshed within its tag's validity window.
    pub fn expire_if_stale(&mut self, now: DateTime<Utc>) -> bool {
        match self.last_update {
            Some(last) if (now - last).num_seconds() > self.tag.validity_seconds() => {
                self.invalidate();
                true
            }
            None => false,
            _ => false,
        }
    }
}

/// `alternative_frequencies`, `frequencies` and similar tuning-info
/// fields decode to a plain frequency in Hz.
pub type FreqRdsValue = RdsValue<i32>;
/// Transparent data channel payload (16 bits).
pub type TdcRdsValue = RdsValue<u32>;
/// ODA AID registry value: which application is registered for a group type.
pub type OdaAidRdsValue = RdsValue<u16>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgrammeItemStartTime {
    pub day_of_month: u8,
    pub hour: u8,
    pub minute: u8,
}

/// One foreign network's data as relayed via Enhanced Other Networks
/// (group type 14) tuning to that network's own PI.
#[derive(Debug, Clone)]
pub struct EonProgrammeInfo {
    pub programme_service_name: Vec<RdsValue<char>>,
    pub frequencies: Vec<FreqRdsValue>,
    pub traffic_programme: RdsValue<bool>,
    pub traffic_announcement: RdsValue<bool>,
    pub programme_type: RdsValue<u16>,
    pub programme_item_start_time: RdsValue<ProgrammeItemStartTime>,
    pub linkage_actuator: RdsValue<bool>,
    pub extended_generic: RdsValue<bool>,
    pub i13l_linkage_set: RdsValue<bool>,
    pub linkage_set_number: RdsValue<u16>,
}

impl EonProgrammeInfo {
    pub fn new() -> Self {
        EonProgrammeInfo {
            programme_service_name: (0..8).map(|_| RdsValue::new(ValueTag::Text)).collect(),
            frequencies: Vec::new(),
            traffic_programme: RdsValue::new(ValueTag::Programme),
            traffic_announcement: RdsValue::new(ValueTag::Current),
            programme_type: RdsValue::new(ValueTag::Programme),
            programme_item_start_time: RdsValue::new(ValueTag::Programme),
            linkage_actuator: RdsValue::new(ValueTag::Programme),
            extended_generic: RdsValue::new(ValueTag::Programme),
            i13l_linkage_set: RdsValue::new(ValueTag::Programme),
            linkage_set_number: RdsValue::new(ValueTag::Programme),
        }
    }

    fn any_valid(&self) -> bool {
        self.programme_service_name.iter().any(|v| v.valid())
            || self.traffic_programme.valid()
            || self.traffic_announcement.valid()
            || self.programme_type.valid()
    }
}

impl Default for EonProgrammeInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// TMC (Traffic Message Channel) continuity-index bucket count: messages
/// spanning multiple groups are reassembled per continuity index 0..5.
pub const TMC_CONTINUITY_COUNT: usize = 6;
/// Maximum number of "next" continuation groups a multi-group message
/// can have beyond its first/second group.
pub const TMC_MAX_EXTRA_GROUPS_COUNT: usize = 3;
/// Seconds a TMC message is considered the same incident if repeated,
/// rather than a fresh message under the same continuity index.
pub const TMC_IMMEDIATE_TIMEOUT_SECONDS: i64 = 15;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TmcMessage {
    pub duration: u16,
    pub diversion: bool,
    pub negative_direction: bool,
    pub extent: u16,
    pub event: u16,
    pub location: u16,
    pub total_extra_groups: u16,
    pub extra: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct TmcPendingMessage {
    pub check_data: Vec<u64>,
    pub status: RdsDecodingStatus,
    pub message: TmcMessage,
}

#[derive(Debug, Clone)]
pub struct TmcFirstGroup {
    pub message: TmcMessage,
    pub timestamp: DateTime<Utc>,
    pub count: u16,
}

#[derive(Debug, Clone)]
pub struct TmcSecondGroup {
    pub message: TmcMessage,
    pub timestamp: DateTime<Utc>,
    pub count: u16,
    pub remaining_groups: u16,
    pub data: u32,
}

#[derive(Debug, Clone)]
pub struct TmcNextGroup {
    pub message: TmcMessage,
    pub timestamp: DateTime<Utc>,
    pub count: u16,
    pub data: u32,
}

#[derive(Debug, Clone)]
pub struct TmcChannel {
    pub frequencies: Vec<FreqRdsValue>,
    pub programme_identification: RdsValue<u16>,
    pub ltn: RdsValue<u16>,
    pub sid: RdsValue<u16>,
    pub scope_i13l: RdsValue<bool>,
    pub scope_national: RdsValue<bool>,
    pub scope_regional: RdsValue<bool>,
    pub scope_urban: RdsValue<bool>,
}

impl TmcChannel {
    pub fn new() -> Self {
        TmcChannel {
            frequencies: Vec::new(),
            programme_identification: RdsValue::new(ValueTag::Programme),
            ltn: RdsValue::new(ValueTag::Programme),
            sid: RdsValue::new(ValueTag::Programme),
            scope_i13l: RdsValue::new(ValueTag::Programme),
            scope_national: RdsValue::new(ValueTag::Programme),
            scope_regional: RdsValue::new(ValueTag::Programme),
            scope_urban: RdsValue::new(ValueTag::Programme),
        }
    }

    fn any_valid(&self) -> bool {
        self.programme_identification.valid() || self.ltn.valid() || self.sid.valid()
    }
}

impl Default for TmcChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// One fully decoded (or error-corrected) RDS block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RdsBlock {
    pub data: u16,
    pub status: RdsDecodingStatus,
}

impl Default for RdsBlock {
    fn default() -> Self {
        RdsBlock {
            data: 0,
            status: RdsDecodingStatus::Uncorrectable,
        }
    }
}

/// Four synchronized blocks (A/B/C/D), as emitted by
/// [`crate::rds::groups_decoder::RdsGroupsDecoder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RdsGroup {
    pub blocks: [RdsBlock; 4],
}

impl std::ops::Index<usize> for RdsGroup {
    type Output = RdsBlock;
    fn index(&self, index: usize) -> &RdsBlock {
        &self.blocks[index]
    }
}

impl std::ops::IndexMut<usize> for RdsGroup {
    fn index_mut(&mut self, index: usize) -> &mut RdsBlock {
        &mut self.blocks[index]
    }
}

/// Aggregate decoded RDS state for one tuned station. Populated by
/// [`crate::rds::messages_decoder::decode_group`].
#[derive(Debug, Clone)]
pub struct RdsState {
    pub programme_identification: RdsValue<u16>,
    pub programme_type: RdsValue<u16>,

    pub traffic_programme: RdsValue<bool>,
    pub traffic_announcement: RdsValue<bool>,
    pub music_speech: RdsValue<bool>,
    pub stereo: RdsValue<bool>,
    pub artificial_head: RdsValue<bool>,
    pub compressed: RdsValue<bool>,
    pub dynamic_pty: RdsValue<bool>,

    pub alternative_frequencies: Vec<FreqRdsValue>,
    pub programme_service_name: Vec<RdsValue<char>>,

    pub country: RdsValue<&'static str>,
    pub language: RdsValue<&'static str>,

    pub linkage_actuator: RdsValue<bool>,
    pub programme_item_start_time: RdsValue<ProgrammeItemStartTime>,

    pub radio_text: Vec<RdsValue<char>>,
    pub text_ab: RdsValue<bool>,

    pub oda_message: RdsValue<u16>,
    pub oda_aids: HashMap<u16, OdaAidRdsValue>,

    pub current_time: RdsValue<DateTime<Utc>>,

    pub transparent_data_channels: HashMap<u16, TdcRdsValue>,

    tmc_multigroups_first: Vec<HashMap<u64, TmcFirstGroup>>,
    tmc_multigroups_second: Vec<HashMap<u64, TmcSecondGroup>>,
    tmc_multigroups_next: Vec<Vec<HashMap<u64, TmcNextGroup>>>,
    tmc_pending_messages: HashMap<u64, TmcPendingMessage>,

    pub tmc_service_provider_name: Vec<RdsValue<char>>,
    pub tmc_channels: Vec<TmcChannel>,
    pub tmc_ltn: RdsValue<u16>,
    pub tmc_gap: RdsValue<u16>,
    pub tmc_sid: RdsValue<u16>,
    pub tmc_activity_time: RdsValue<u16>,
    pub tmc_window_time: RdsValue<u16>,
    pub tmc_delay_time: RdsValue<u16>,
    pub tmc_afi: RdsValue<bool>,
    pub tmc_mode: RdsValue<bool>,
    pub tmc_scope_i13l: RdsValue<bool>,
    pub tmc_scope_national: RdsValue<bool>,
    pub tmc_scope_regional: RdsValue<bool>,
    pub tmc_scope_urban: RdsValue<bool>,

    pub programme_type_name: Vec<RdsValue<char>>,
    pub ptn_ab: RdsValue<bool>,

    pub eon_mapping: HashMap<u16, EonProgrammeInfo>,

    pub dab_eid: RdsValue<u16>,
    pub dab_sid: RdsValue<u16>,
    pub dab_mode: RdsValue<u16>,
    pub dab_link_linkage_set_number: RdsValue<u16>,
    pub dab_link_linkage_actuator: RdsValue<bool>,
    pub dab_link_soft_hard: RdsValue<bool>,
    pub dab_link_extended_generic: RdsValue<bool>,
    pub dab_link_i13l_linkage_set: RdsValue<bool>,
    pub dab_freq: RdsValue<u32>,
}

impl RdsState {
    pub fn new() -> Self {
        RdsState {
            programme_identification: RdsValue::new(ValueTag::Programme),
            programme_type: RdsValue::new(ValueTag::Programme),

            traffic_programme: RdsValue::new(ValueTag::Programme),
            traffic_announcement: RdsValue::new(ValueTag::Current),
            music_speech: RdsValue::new(ValueTag::Current),
            stereo: RdsValue::new(ValueTag::Current),
            artificial_head: RdsValue::new(ValueTag::Current),
            compressed: RdsValue::new(ValueTag::Current),
            dynamic_pty: RdsValue::new(ValueTag::Current),

            alternative_frequencies: Vec::new(),
            programme_service_name: (0..8).map(|_| RdsValue::new(ValueTag::Text)).collect(),

            country: RdsValue::new(ValueTag::Programme),
            language: RdsValue::new(ValueTag::Programme),

            linkage_actuator: RdsValue::new(ValueTag::Programme),
            programme_item_start_time: RdsValue::new(ValueTag::Programme),

            radio_text: (0..64).map(|_| RdsValue::new(ValueTag::Text)).collect(),
            text_ab: RdsValue::new(ValueTag::Text),

            oda_message: RdsValue::new(ValueTag::Programme),
            oda_aids: HashMap::new(),

            current_time: RdsValue::new(ValueTag::Clock),

            transparent_data_channels: HashMap::new(),

            tmc_multigroups_first: (0..TMC_CONTINUITY_COUNT).map(|_| HashMap::new()).collect(),
            tmc_multigroups_second: (0..TMC_CONTINUITY_COUNT).map(|_| HashMap::new()).collect(),
            tmc_multigroups_next: (0..TMC_CONTINUITY_COUNT)
                .map(|_| (0..TMC_MAX_EXTRA_GROUPS_COUNT).map(|_| HashMap::new()).collect())
                .collect(),
            tmc_pending_messages: HashMap::new(),

            tmc_service_provider_name: (0..8).map(|_| RdsValue::new(ValueTag::Programme)).collect(),
            tmc_channels: Vec::new(),
            tmc_ltn: RdsValue::new(ValueTag::Programme),
            tmc_gap: RdsValue::new(ValueTag::Programme),
            tmc_sid: RdsValue::new(ValueTag::Programme),
            tmc_activity_time: RdsValue::new(ValueTag::Programme),
            tmc_window_time: RdsValue::new(ValueTag::Programme),
            tmc_delay_time: RdsValue::new(ValueTag::Programme),
            tmc_afi: RdsValue::new(ValueTag::Programme),
            tmc_mode: RdsValue::new(ValueTag::Programme),
            tmc_scope_i13l: RdsValue::new(ValueTag::Programme),
            tmc_scope_national: RdsValue::new(ValueTag::Programme),
            tmc_scope_regional: RdsValue::new(ValueTag::Programme),
            tmc_scope_urban: RdsValue::new(ValueTag::Programme),

            programme_type_name: (0..8).map(|_| RdsValue::new(ValueTag::Text)).collect(),
            ptn_ab: RdsValue::new(ValueTag::Text),

            eon_mapping: HashMap::new(),

            dab_eid: RdsValue::new(ValueTag::Programme),
            dab_sid: RdsValue::new(ValueTag::Programme),
            dab_mode: RdsValue::new(ValueTag::Programme),
            dab_link_linkage_set_number: RdsValue::new(ValueTag::Programme),
            dab_link_linkage_actuator: RdsValue::new(ValueTag::Programme),
            dab_link_soft_hard: RdsValue::new(ValueTag::Programme),
            dab_link_extended_generic: RdsValue::new(ValueTag::Programme),
            dab_link_i13l_linkage_set: RdsValue::new(ValueTag::Programme),
            dab_freq: RdsValue::new(ValueTag::Programme),
        }
    }

    pub(crate) fn tmc_multigroups_first(&mut self) -> &mut [HashMap<u64, TmcFirstGroup>] {
        &mut self.tmc_multigroups_first
    }

    pub(crate) fn tmc_multigroups_second(&mut self) -> &mut [HashMap<u64, TmcSecondGroup>] {
        &mut self.tmc_multigroups_second
    }

    pub(crate) fn tmc_multigroups_next(&mut self) -> &mut [Vec<HashMap<u64, TmcNextGroup>>] {
        &mut self.tmc_multigroups_next
    }

    pub(crate) fn tmc_pending_messages(&mut self) -> &mut HashMap<u64, TmcPendingMessage> {
        &mut self.tmc_pending_messages
    }

    /// Invalidates every field whose validity window has elapsed (or,
    /// with `everything`, invalidates unconditionally -- used when
    /// retuning to a different station). Ported from `RdsState::clear`.
    pub fn clear(&mut self, everything: bool, now: DateTime<Utc>) {
        clear_value(&mut self.programme_identification, everything, now);
        clear_value(&mut self.programme_type, everything, now);

        clear_value(&mut self.traffic_programme, everything, now);
        clear_value(&mut self.traffic_announcement, everything, now);
        clear_value(&mut self.music_speech, everything, now);
        clear_value(&mut self.stereo, everything, now);
        clear_value(&mut self.artificial_head, everything, now);
        clear_value(&mut self.compressed, everything, now);
        clear_value(&mut self.dynamic_pty, everything, now);

        clear_vec_and_remove(&mut self.alternative_frequencies, everything, now);
        clear_vec_in_place(&mut self.programme_service_name, everything, now);

        clear_value(&mut self.country, everything, now);
        clear_value(&mut self.language, everything, now);

        clear_value(&mut self.linkage_actuator, everything, now);
        clear_value(&mut self.programme_item_start_time, everything, now);

        clear_vec_in_place(&mut self.radio_text, everything, now);
        clear_value(&mut self.text_ab, everything, now);

        clear_value(&mut self.oda_message, everything, now);
        clear_map_and_remove(&mut self.oda_aids, everything, now);

        clear_value(&mut self.current_time, everything, now);

        clear_map_and_remove(&mut self.transparent_data_channels, everything, now);

        clear_vec_in_place(&mut self.tmc_service_provider_name, everything, now);
        if everything {
            self.tmc_channels.clear();
        } else {
            self.tmc_channels.retain_mut(|c| {
                c.frequencies.retain_mut(|f| !f.expire_if_stale(now));
                c.programme_identification.expire_if_stale(now);
                c.ltn.expire_if_stale(now);
                c.sid.expire_if_stale(now);
                c.scope_i13l.expire_if_stale(now);
                c.scope_national.expire_if_stale(now);
                c.scope_regional.expire_if_stale(now);
                c.scope_urban.expire_if_stale(now);
                c.any_valid()
            });
        }
        clear_value(&mut self.tmc_ltn, everything, now);
        clear_value(&mut self.tmc_gap, everything, now);
        clear_value(&mut self.tmc_sid, everything, now);
        clear_value(&mut self.tmc_activity_time, everything, now);
        clear_value(&mut self.tmc_window_time, everything, now);
        clear_value(&mut self.tmc_delay_time, everything, now);
        clear_value(&mut self.tmc_afi, everything, now);
        clear_value(&mut self.tmc_mode, everything, now);
        clear_value(&mut self.tmc_scope_i13l, everything, now);
        clear_value(&mut self.tmc_scope_national, everything, now);
        clear_value(&mut self.tmc_scope_regional, everything, now);
        clear_value(&mut self.tmc_scope_urban, everything, now);

        clear_vec_in_place(&mut self.programme_type_name, everything, now);
        clear_value(&mut self.ptn_ab, everything, now);

        if everything {
            self.eon_mapping.clear();
        } else {
            self.eon_mapping.retain(|_, info| {
                for v in info.programme_service_name.iter_mut() {
                    v.expire_if_stale(now);
                }
                info.frequencies.retain_mut(|f| !f.expire_if_stale(now));
                info.traffic_programme.expire_if_stale(now);
                info.traffic_announcement.expire_if_stale(now);
                info.programme_type.expire_if_stale(now);
                info.programme_item_start_time.expire_if_stale(now);
                info.linkage_actuator.expire_if_stale(now);
                info.extended_generic.expire_if_stale(now);
                info.i13l_linkage_set.expire_if_stale(now);
                info.linkage_set_number.expire_if_stale(now);
                info.any_valid()
            });
        }

        clear_value(&mut self.dab_eid, everything, now);
        clear_value(&mut self.dab_sid, everything, now);
        clear_value(&mut self.dab_mode, everything, now);
        clear_value(&mut self.dab_link_linkage_set_number, everything, now);
        clear_value(&mut self.dab_link_linkage_actuator, everything, now);
        clear_value(&mut self.dab_link_soft_hard, everything, now);
        clear_value(&mut self.dab_link_extended_generic, everything, now);
        clear_value(&mut self.dab_link_i13l_linkage_set, everything, now);
        clear_value(&mut self.dab_freq, everything, now);
    }

    /// Flushes stale TMC multi-group assembly state: partial messages
    /// that never got their remaining groups within the immediate-repeat
    /// timeout are dropped rather than held forever. Ported from
    /// `RdsState::clearTmc`.
    pub fn clear_tmc(&mut self, everything: bool, now: DateTime<Utc>) {
        let timeout = TMC_IMMEDIATE_TIMEOUT_SECONDS;
        let stale = |ts: DateTime<Utc>| everything || (now - ts).num_seconds() > timeout;

        for bucket in self.tmc_multigroups_first.iter_mut() {
            bucket.retain(|_, g| !stale(g.timestamp));
        }
        for bucket in self.tmc_multigroups_second.iter_mut() {
            bucket.retain(|_, g| !stale(g.timestamp));
        }
        for ci_buckets in self.tmc_multigroups_next.iter_mut() {
            for bucket in ci_buckets.iter_mut() {
                bucket.retain(|_, g| !stale(g.timestamp));
            }
        }
        if everything {
            self.tmc_pending_messages.clear();
        }
    }

    /// Human-readable dump of the currently valid fields, for the `live`
    /// CLI's `r` key and the `test` subcommand's summary output.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if let Some(pi) = self.programme_identification.value() {
            out.push_str(&format!("PI: {pi:04X}\n"));
        }
        if self.programme_service_name.iter().any(|c| c.valid()) {
            let ps: String = self
                .programme_service_name
                .iter()
                .map(|c| c.value().copied().unwrap_or(' '))
                .collect();
            out.push_str(&format!("PS: {ps}\n"));
        }
        if let Some(pty) = self.programme_type.value() {
            out.push_str(&format!("PTY: {pty}\n"));
        }
        if self.traffic_programme.valid() {
            out.push_str(&format!("TP: {}\n", self.traffic_programme.value().copied().unwrap_or(false)));
        }
        if self.traffic_announcement.valid() {
            out.push_str(&format!("TA: {}\n", self.traffic_announcement.value().copied().unwrap_or(false)));
        }
        if self.radio_text.iter().any(|c| c.valid()) {
            let rt: String = self
                .radio_text
                .iter()
                .map(|c| c.value().copied().unwrap_or(' '))
                .collect();
            out.push_str(&format!("RT: {}\n", rt.trim_end()));
        }
        if let Some(time) = self.current_time.value() {
            out.push_str(&format!("CT: {}\n", time.to_rfc3339()));
        }
        let afs: Vec<i32> = self
            .alternative_frequencies
            .iter()
            .filter_map(|f| f.value().copied())
            .collect();
        if !afs.is_empty() {
            out.push_str(&format!("AF: {afs:?}\n"));
        }
        out
    }
}

impl Default for RdsState {
    fn default() -> Self {
        Self::new()
    }
}

fn clear_value<T: Clone + PartialEq>(value: &mut RdsValue<T>, everything: bool, now: DateTime<Utc>) {
    if everything {
        value.invalidate();
    } else {
        value.expire_if_stale(now);
    }
}

fn clear_vec_in_place<T: Clone + PartialEq>(values: &mut [RdsValue<T>], everything: bool, now: DateTime<Utc>) {
    for v in values.iter_mut() {
        clear_value(v, everything, now);
    }
}

fn clear_vec_and_remove<T: Clone + PartialEq>(values: &mut Vec<RdsValue<T>>, everything: bool, now: DateTime<Utc>) {
    if everything {
        values.clear();
        return;
    }
    values.retain_mut(|v| !v.expire_if_stale(now));
}

fn clear_map_and_remove<K: Eq + std::hash::Hash + Copy, T: Clone + PartialEq>(
    map: &mut HashMap<K, RdsValue<T>>,
    everything: bool,
    now: DateTime<Utc>,
) {
    if everything {
        map.clear();
        return;
    }
    map.retain(|_, v| !v.expire_if_stale(now));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_status_promotes_immediately() {
        let mut v: RdsValue<u16> = RdsValue::new(ValueTag::Programme);
        v.set(0x1234, 0xABC, RdsDecodingStatus::Valid, Utc::now());
        assert!(v.valid());
        assert_eq!(v.value(), Some(&0x1234));
    }

    #[test]
    fn single_correction_does_not_promote() {
        let mut v: RdsValue<u16> = RdsValue::new(ValueTag::Programme);
        v.set(0x1234, 0xABC, RdsDecodingStatus::Corrected, Utc::now());
        assert!(!v.valid());
        assert_eq!(v.last_value(), Some(&0x1234));
    }

    #[test]
    fn two_matching_corrections_promote() {
        let mut v: RdsValue<u16> = RdsValue::new(ValueTag::Programme);
        v.set(0x1234, 0xABC, RdsDecodingStatus::Corrected, Utc::now());
        assert!(!v.valid());
        v.set(0x1234, 0xABC, RdsDecodingStatus::Corrected, Utc::now());
        assert!(v.valid());
    }

    #[test]
    fn mismatched_corrections_never_promote() {
        let mut v: RdsValue<u16> = RdsValue::new(ValueTag::Programme);
        v.set(0x1234, 0xABC, RdsDecodingStatus::Corrected, Utc::now());
        v.set(0x5678, 0xDEF, RdsDecodingStatus::Corrected, Utc::now());
        assert!(!v.valid());
    }

    #[test]
    fn expires_after_validity_window() {
        let mut v: RdsValue<u16> = RdsValue::new(ValueTag::Current);
        let t0 = Utc::now();
        v.set(1, 0, RdsDecodingStatus::Valid, t0);
        assert!(v.valid());
        let later = t0 + chrono::Duration::seconds(ValueTag::Current.validity_seconds() + 1);
        assert!(v.expire_if_stale(later));
        assert!(!v.valid());
    }

    #[test]
    fn group_indexing_matches_blocks_field() {
        let mut group = RdsGroup::default();
        group[1].data = 0x42;
        assert_eq!(group.blocks[1].data, 0x42);
    }

    #[test]
    fn clear_everything_invalidates_scalar_fields() {
        let mut state = RdsState::new();
        state.programme_identification.set(0xBEEF, 0, RdsDecodingStatus::Valid, Utc::now());
        assert!(state.programme_identification.valid());
        state.clear(true, Utc::now());
        assert!(!state.programme_identification.valid());
    }
}
