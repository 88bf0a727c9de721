//! Per-group-type RDS message decoding: takes a synchronized, error-corrected
//! [`RdsGroup`] and folds its payload into the long-lived [`RdsState`].
//!
//! Ported from `hvylya::filters::fm::decodeGroup` and its per-type helpers.
//! Two recurring patterns from the source:
//! - Every field is fed through `RdsValue::set`, which itself decides
//!   whether a `Corrected` block is trustworthy (see `rds::state`); callers
//!   here never gate on `status == Valid` except where the source does.
//! - Block A always carries the PI and block B always carries TP/PTY,
//!   regardless of group type, so those are decoded once up front.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::rds::ecc::RdsDecodingStatus;
use crate::rds::state::{
    EonProgrammeInfo, FreqRdsValue, ProgrammeItemStartTime, RdsBlock, RdsGroup, RdsState,
    RdsValue, TmcChannel, TmcFirstGroup, TmcMessage, TmcNextGroup, TmcPendingMessage,
    TmcSecondGroup, ValueTag, TMC_MAX_EXTRA_GROUPS_COUNT,
};

// ETSI EN 300 401 / Annex G country and language tables, indexed by
// `15*(ecc-0xE0)+cc-1` and raw language code respectively. `None` marks a
// code the standard leaves unassigned.
#[rustfmt::skip]
const COUNTRIES_EUROPE: [Option<&str>; 75] = [
    Some("DE"), Some("DZ"), Some("AD"), Some("IL"), Some("IT"), Some("BE"), Some("RU"), Some("PS"), Some("AL"), Some("AT"), Some("HU"), Some("MT"), Some("DE"), None, Some("EG"),
    Some("GR"), Some("CY"), Some("SM"), Some("CH"), Some("JO"), Some("FI"), Some("LU"), Some("BG"), Some("DK"), Some("GI"), Some("IQ"), Some("GB"), Some("LY"), Some("RO"), Some("FR"),
    Some("MA"), Some("CZ"), Some("PL"), Some("VA"), Some("SK"), Some("SY"), Some("TN"), None, Some("LI"), Some("IS"), Some("MC"), Some("LT"), Some("YU"), Some("ES"), Some("NO"),
    None, Some("IE"), Some("TR"), Some("MK"), None, None, None, Some("NL"), Some("LV"), Some("LB"), None, Some("HR"), None, Some("SE"), Some("BY"),
    Some("MD"), Some("EE"), None, None, None, Some("UA"), None, Some("PT"), Some("SI"), None, None, None, None, None, Some("BA"),
];

#[rustfmt::skip]
const LANGUAGES_EUROPE: [&str; 44] = [
    "Unknown", "Albanian", "Breton", "Catalan", "Croatian", "Welsh", "Czech", "Danish",
    "German", "English", "Spanish", "Esperanto", "Estonian", "Basque", "Faroese", "French",
    "Frisian", "Irish", "Gaelic", "Galician", "Icelandic", "Italian", "Lappish", "Latin",
    "Latvian", "Luxembourgian", "Lithuanian", "Hungarian", "Maltese", "Dutch", "Norwegian",
    "Occitan", "Polish", "Portuguese", "Romanian", "Romansh", "Serbian", "Slovak", "Slovene",
    "Finnish", "Swedish", "Turkish", "Flemish", "Walloon",
];

/// The `(raw_bits, status)` pair an [`RdsValue`] is fed along with its
/// decoded value, used to recognize repeated/agreeing corrections. Plain
/// block access (`group[i].into()`) is the single-block case; `typed_*`
/// below fold in block B so two group types sharing a payload block don't
/// alias each other's correction history.
#[derive(Clone, Copy)]
struct CheckData {
    data: u64,
    status: RdsDecodingStatus,
}

impl From<RdsBlock> for CheckData {
    fn from(block: RdsBlock) -> Self {
        CheckData {
            data: block.data as u64,
            status: block.status,
        }
    }
}

fn typed_status(group: &RdsGroup, index: usize) -> RdsDecodingStatus {
    group[1].status.min(group[index].status)
}

fn typed_check_data(group: &RdsGroup, index: usize) -> CheckData {
    CheckData {
        data: ((group[1].data as u64) << 16) | group[index].data as u64,
        status: typed_status(group, index),
    }
}

fn typed_check_data_both(group: &RdsGroup) -> CheckData {
    let c = typed_check_data(group, 2);
    CheckData {
        data: (c.data << 16) | group[3].data as u64,
        status: c.status.min(group[3].status),
    }
}

/// Masks out the continuity index (bits 32..35) from a combined A/B/C/D
/// check value: immediate repetition is checked explicitly against it,
/// periodic repetition doesn't care, so it shouldn't factor into whether
/// two multi-group fragments are "the same" data.
fn tmc_multigroup_check_data(group: &RdsGroup) -> CheckData {
    let mut check_data = typed_check_data_both(group);
    check_data.data &= !(0x7u64 << 32);
    check_data
}

fn decode_group_fields_common(state: &mut RdsState, group: &RdsGroup, index: usize, now: DateTime<Utc>) {
    let pi: CheckData = group[index].into();
    state.programme_identification.set(group[index].data, pi.data, pi.status, now);
    let b2: CheckData = group[index + 1].into();
    state
        .traffic_programme
        .set(group[index + 1].data & (1 << 10) != 0, b2.data, b2.status, now);
    state
        .programme_type
        .set((group[index + 1].data >> 5) & 0x1F, b2.data, b2.status, now);
}

fn decode_group_common(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) -> u16 {
    decode_group_fields_common(state, group, 0, now);
    group[1].data >> 11
}

fn decode_tuning_info_common(state: &mut RdsState, group: &RdsGroup, index: usize, now: DateTime<Utc>) -> u16 {
    let b: CheckData = group[index].into();
    let data = group[index].data;
    state.traffic_announcement.set(data & (1 << 4) != 0, b.data, b.status, now);
    state.music_speech.set(data & (1 << 3) != 0, b.data, b.status, now);

    // Decoder-identification bit, read from the same position as `music_speech`
    // above -- matches the reference's literal bit reuse.
    let di = data & (1 << 3) != 0;
    let seg = data & 0x03;
    match seg {
        0 => state.stereo.set(di, b.data, b.status, now),
        1 => state.artificial_head.set(di, b.data, b.status, now),
        2 => state.compressed.set(di, b.data, b.status, now),
        _ => state.dynamic_pty.set(di, b.data, b.status, now),
    }
    seg
}

fn extract_frequency(freq_code: u8, is_lf_mf_freq: bool) -> i32 {
    if is_lf_mf_freq {
        if (1..16).contains(&freq_code) {
            return 153_000 + 9_000 * (freq_code as i32 - 1);
        } else if (16..136).contains(&freq_code) {
            return 531_000 + 9_000 * (freq_code as i32 - 16);
        }
    } else if freq_code > 0 && freq_code < 205 {
        return 87_600_000 + 100_000 * (freq_code as i32 - 1);
    }
    0
}

fn update_frequency(frequencies: &mut Vec<FreqRdsValue>, freq: i32, check_data: CheckData, now: DateTime<Utc>) {
    if let Some(existing) = frequencies.iter_mut().find(|f| f.last_value() == Some(&freq)) {
        existing.set(freq, check_data.data, check_data.status, now);
    } else {
        let mut value = FreqRdsValue::new(ValueTag::Programme);
        value.set(freq, check_data.data, check_data.status, now);
        frequencies.push(value);
    }
}

fn add_frequencies(
    frequencies: &mut Vec<FreqRdsValue>,
    group: &RdsGroup,
    index: usize,
    check_data_both: bool,
    now: DateTime<Utc>,
) {
    if group[index].status < RdsDecodingStatus::Corrected {
        return;
    }
    let check_data = if check_data_both {
        typed_check_data_both(group)
    } else {
        typed_check_data(group, index)
    };
    let freqs_codes = group[index].data;
    if (freqs_codes >> 8) == 250 {
        let freq = extract_frequency((freqs_codes & 0xFF) as u8, true);
        if freq != 0 {
            update_frequency(frequencies, freq, check_data, now);
        }
    } else {
        let mut codes = freqs_codes;
        for _ in 0..2 {
            let freq = extract_frequency((codes & 0xFF) as u8, false);
            if freq != 0 {
                update_frequency(frequencies, freq, check_data, now);
            }
            codes >>= 8;
        }
    }
}

fn decode_programme_item_start_time(
    start_time: &mut RdsValue<ProgrammeItemStartTime>,
    group: &RdsGroup,
    index: usize,
    check_data_both: bool,
    now: DateTime<Utc>,
) {
    let check_data = if check_data_both {
        typed_check_data_both(group)
    } else {
        typed_check_data(group, index)
    };
    let value = group[index].data;
    let pin_time = ProgrammeItemStartTime {
        day_of_month: ((value >> 11) & 0x1F) as u8,
        hour: ((value >> 6) & 0x1F) as u8,
        minute: (value & 0x3F) as u8,
    };
    start_time.set(pin_time, check_data.data, check_data.status, now);
}

/// Invalidates every slot of a multi-slot text field (radio text,
/// programme-type name) the moment its `_ab` toggle flips -- the broadcaster
/// is signalling "I'm about to send different text, don't show a splice of
/// old and new". Ported from the reference's `changing()` signal hookup in
/// `RdsMessagesDecoder`'s constructor.
fn set_toggle_and_invalidate_on_change<T: Clone + PartialEq>(
    flag: &mut RdsValue<bool>,
    container: &mut [RdsValue<T>],
    new_bit: bool,
    check_data: CheckData,
    now: DateTime<Utc>,
) {
    let old = flag.value().copied();
    flag.set(new_bit, check_data.data, check_data.status, now);
    if old != flag.value().copied() {
        for v in container.iter_mut() {
            v.invalidate();
        }
    }
}

fn decode_group_type_0(state: &mut RdsState, ver_b: bool, group: &RdsGroup, now: DateTime<Utc>) {
    let seg = decode_tuning_info_common(state, group, 1, now);

    if !ver_b {
        add_frequencies(&mut state.alternative_frequencies, group, 2, false, now);
    } else {
        let pi: CheckData = group[2].into();
        state.programme_identification.set(group[2].data, pi.data, pi.status, now);
    }

    let check_data = typed_check_data(group, 3);
    let index = 2 * seg as usize;
    state.programme_service_name[index].set((group[3].data >> 8) as u8 as char, check_data.data, check_data.status, now);
    state.programme_service_name[index + 1].set(
        (group[3].data & 0xFF) as u8 as char,
        check_data.data,
        check_data.status,
        now,
    );
}

fn decode_group_type_1(state: &mut RdsState, ver_b: bool, group: &RdsGroup, now: DateTime<Utc>) {
    if !ver_b {
        if group[2].status >= RdsDecodingStatus::Corrected {
            let code_selector = (group[2].data >> 12) & 0x07;
            let b2: CheckData = group[2].into();
            state
                .linkage_actuator
                .set(group[2].data & (1 << 15) != 0, b2.data, b2.status, now);

            match code_selector {
                0x00 => {
                    if let Some(&pi) = state.programme_identification.value() {
                        let cc = pi >> 12;
                        let ecc = group[2].data & 0xFF;
                        if (0xE0..=0xE4).contains(&ecc) && cc > 0 {
                            if let Some(country) = COUNTRIES_EUROPE[(15 * (ecc - 0xE0) + cc - 1) as usize] {
                                let cd = typed_check_data(group, 2);
                                state.country.set(country, cd.data, cd.status, now);
                            }
                        }
                    }
                }
                0x01 => {
                    // Not used for TMC via ODA; present only to decode historical captures.
                    let cd = typed_check_data(group, 2);
                    decode_tmc_system_info_common(state, group, cd, now);
                }
                0x02 => {
                    // Paging identification: paging decoding is out of scope, skip.
                }
                0x03 => {
                    let lang_code = (group[2].data & 0x7FF) as usize;
                    if lang_code < LANGUAGES_EUROPE.len() {
                        let cd = typed_check_data(group, 2);
                        state.language.set(LANGUAGES_EUROPE[lang_code], cd.data, cd.status, now);
                    }
                }
                0x06 | 0x07 => {
                    // Broadcaster-use / Emergency Warning System: format not standardized, skip.
                }
                other => {
                    if group[1].status == RdsDecodingStatus::Valid && group[2].status == RdsDecodingStatus::Valid {
                        tracing::warn!(code_selector = other, "unexpected code selector for group 1A");
                    }
                }
            }
        }
    } else {
        let pi: CheckData = group[2].into();
        state.programme_identification.set(group[2].data, pi.data, pi.status, now);
    }

    decode_programme_item_start_time(&mut state.programme_item_start_time, group, 3, false, now);
}

fn decode_group_type_2(state: &mut RdsState, ver_b: bool, group: &RdsGroup, now: DateTime<Utc>) {
    let b1: CheckData = group[1].into();
    set_toggle_and_invalidate_on_change(
        &mut state.text_ab,
        &mut state.radio_text,
        group[1].data & (1 << 4) != 0,
        b1,
        now,
    );

    let seg = (group[1].data & 0x0F) as usize;
    let mut index = 4 * seg;

    if !ver_b {
        let cd2 = typed_check_data(group, 2);
        state.radio_text[index].set((group[2].data >> 8) as u8 as char, cd2.data, cd2.status, now);
        state.radio_text[index + 1].set((group[2].data & 0xFF) as u8 as char, cd2.data, cd2.status, now);
        index += 2;
    } else {
        index = 2 * seg;
        let pi: CheckData = group[2].into();
        state.programme_identification.set(group[2].data, pi.data, pi.status, now);
    }

    let cd3 = typed_check_data(group, 3);
    state.radio_text[index].set((group[3].data >> 8) as u8 as char, cd3.data, cd3.status, now);
    state.radio_text[index + 1].set((group[3].data & 0xFF) as u8 as char, cd3.data, cd3.status, now);
}

fn decode_group_type_3a(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    decode_open_data_application_init_message(state, group, now);

    if group[3].status >= RdsDecodingStatus::Corrected {
        let app_group_type = group[1].data & 0x1F;
        let aid = group[3].data;
        let cd = typed_check_data(group, 3);
        state
            .oda_aids
            .entry(app_group_type)
            .or_insert_with(|| RdsValue::new(ValueTag::Programme))
            .set(aid, cd.data, cd.status, now);
    }
}

fn decode_group_type_4a(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    if group[2].status < RdsDecodingStatus::Corrected || group[3].status < RdsDecodingStatus::Corrected {
        return;
    }

    let mjd = (((group[1].data & 0x03) as u32) << 15) | (group[2].data >> 1) as u32;
    let hour = (((group[2].data & 1) << 4) | (group[3].data >> 12)) as u32;
    let minute = ((group[3].data >> 6) & 0x3F) as u32;

    let mjd_f = mjd as f64;
    let tmp_year = ((mjd_f - 15078.2) / 365.25) as i64;
    let tmp_month = ((mjd_f - 14956.1 - (tmp_year as f64 * 365.25) as i64 as f64) / 30.6001) as i64;
    let day = mjd as i64 - 14956 - (tmp_year as f64 * 365.25) as i64 - (tmp_month as f64 * 30.6001) as i64;
    let k = if tmp_month == 14 || tmp_month == 15 { 1 } else { 0 };
    let year = tmp_year + k + 1900;
    let month = tmp_month - 1 - 12 * k;

    let date = match NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32) {
        Some(d) => d,
        None => return,
    };
    let time = match NaiveTime::from_hms_opt(hour, minute, 0) {
        Some(t) => t,
        None => return,
    };
    let naive = NaiveDateTime::new(date, time);
    let check_data = typed_check_data_both(group);
    state.current_time.set(Utc.from_utc_datetime(&naive), check_data.data, check_data.status, now);
}

fn decode_group_type_10a(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    let b1: CheckData = group[1].into();
    set_toggle_and_invalidate_on_change(
        &mut state.ptn_ab,
        &mut state.programme_type_name,
        group[1].data & (1 << 4) != 0,
        b1,
        now,
    );

    let seg = (group[1].data & 0x01) as usize;
    let index = 4 * seg;

    let cd2 = typed_check_data(group, 2);
    state.programme_type_name[index].set((group[2].data >> 8) as u8 as char, cd2.data, cd2.status, now);
    state.programme_type_name[index + 1].set((group[2].data & 0xFF) as u8 as char, cd2.data, cd2.status, now);

    let cd3 = typed_check_data(group, 3);
    state.programme_type_name[index + 2].set((group[3].data >> 8) as u8 as char, cd3.data, cd3.status, now);
    state.programme_type_name[index + 3].set((group[3].data & 0xFF) as u8 as char, cd3.data, cd3.status, now);
}

fn decode_group_type_14(state: &mut RdsState, ver_b: bool, group: &RdsGroup, now: DateTime<Utc>) {
    if group[3].status < RdsDecodingStatus::Corrected {
        // PI of the other network is unknown, so there's no network to attach this info to.
        return;
    }

    let pi_on = group[3].data;
    let eon_info = state.eon_mapping.entry(pi_on).or_insert_with(EonProgrammeInfo::new);

    if !ver_b && group[2].status >= RdsDecodingStatus::Corrected {
        let b1: CheckData = group[1].into();
        eon_info.traffic_programme.set(group[1].data & (1 << 4) != 0, b1.data, b1.status, now);
        let variant_code = group[1].data & 0x0F;
        let check_data = typed_check_data_both(group);

        match variant_code {
            0x00..=0x03 => {
                let idx = 2 * variant_code as usize;
                eon_info.programme_service_name[idx].set(
                    (group[2].data >> 8) as u8 as char,
                    check_data.data,
                    check_data.status,
                    now,
                );
                eon_info.programme_service_name[idx + 1].set(
                    (group[2].data & 0xFF) as u8 as char,
                    check_data.data,
                    check_data.status,
                    now,
                );
            }
            0x04 => add_frequencies(&mut eon_info.frequencies, group, 2, true, now),
            0x05..=0x08 => {
                let mapped_freq = extract_frequency((group[2].data & 0xFF) as u8, false);
                if mapped_freq != 0 {
                    update_frequency(&mut eon_info.frequencies, mapped_freq, check_data, now);
                }
            }
            0x09 => {
                let mapped_freq = extract_frequency((group[2].data & 0xFF) as u8, true);
                if mapped_freq != 0 {
                    update_frequency(&mut eon_info.frequencies, mapped_freq, check_data, now);
                }
            }
            0x0C => {
                eon_info
                    .linkage_actuator
                    .set(group[2].data & (1 << 15) != 0, check_data.data, check_data.status, now);
                eon_info
                    .extended_generic
                    .set(group[2].data & (1 << 14) != 0, check_data.data, check_data.status, now);
                eon_info
                    .i13l_linkage_set
                    .set(group[2].data & (1 << 13) != 0, check_data.data, check_data.status, now);
                eon_info
                    .linkage_set_number
                    .set(group[2].data & 0x0FFF, check_data.data, check_data.status, now);
            }
            0x0D => {
                eon_info.programme_type.set(group[2].data >> 11, check_data.data, check_data.status, now);
                eon_info
                    .traffic_announcement
                    .set(group[2].data & 0x01 != 0, check_data.data, check_data.status, now);
            }
            0x0E => decode_programme_item_start_time(&mut eon_info.programme_item_start_time, group, 2, true, now),
            0x0F => {
                // Reserved for broadcasters' use.
            }
            _ => {
                if group[1].status == RdsDecodingStatus::Valid {
                    tracing::warn!(variant_code, "unknown EON variant code");
                }
            }
        }
    }
}

fn decode_group_type_15b(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    decode_group_fields_common(state, group, 2, now);
    decode_tuning_info_common(state, group, 3, now);
}

fn decode_tmc_system_info_common(state: &mut RdsState, group: &RdsGroup, check_data: CheckData, now: DateTime<Utc>) {
    state.tmc_ltn.set((group[2].data >> 6) & 0x3F, check_data.data, check_data.status, now);
    state.tmc_afi.set(group[2].data & (1 << 5) != 0, check_data.data, check_data.status, now);
    state.tmc_mode.set(group[2].data & (1 << 4) != 0, check_data.data, check_data.status, now);
    state
        .tmc_scope_i13l
        .set(group[2].data & (1 << 3) != 0, check_data.data, check_data.status, now);
    state
        .tmc_scope_national
        .set(group[2].data & (1 << 2) != 0, check_data.data, check_data.status, now);
    state
        .tmc_scope_regional
        .set(group[2].data & (1 << 1) != 0, check_data.data, check_data.status, now);
    state.tmc_scope_urban.set(group[2].data & 1 != 0, check_data.data, check_data.status, now);
}

fn decode_tmc_system_information(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    let variant_code = group[2].data >> 14;
    let check_data = typed_check_data(group, 2);

    match variant_code {
        0x00 => decode_tmc_system_info_common(state, group, check_data, now),
        0x01 => {
            state.tmc_gap.set((group[2].data >> 12) & 0x03, check_data.data, check_data.status, now);
            state.tmc_sid.set((group[2].data >> 6) & 0x3F, check_data.data, check_data.status, now);
            if state.tmc_mode.valid() && state.tmc_mode.value().copied() == Some(true) {
                state
                    .tmc_activity_time
                    .set((group[2].data >> 4) & 0x03, check_data.data, check_data.status, now);
                state
                    .tmc_window_time
                    .set((group[2].data >> 2) & 0x03, check_data.data, check_data.status, now);
                state.tmc_delay_time.set(group[2].data & 0x03, check_data.data, check_data.status, now);
            }
        }
        other => {
            if group[1].status == RdsDecodingStatus::Valid && group[2].status == RdsDecodingStatus::Valid {
                tracing::warn!(variant_code = other, "unexpected variant code for TMC ODA init message");
            }
        }
    }
}

/// See ETSI EN 301 700 (DAB cross-reference via RDS).
fn decode_dab_reference(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    let es = group[1].data & (1 << 4) != 0;

    if es {
        // Service table, 5.3.4.
        let variant_code = group[1].data & 0x0F;
        match variant_code {
            0x00 => {
                let cd = typed_check_data(group, 2);
                state.dab_eid.set(group[2].data, cd.data, cd.status, now);
            }
            0x01 => {
                let cd = typed_check_data(group, 2);
                state
                    .dab_link_linkage_actuator
                    .set(group[2].data & (1 << 14) != 0, cd.data, cd.status, now);
                state.dab_link_soft_hard.set(group[2].data & (1 << 13) != 0, cd.data, cd.status, now);
                state
                    .dab_link_i13l_linkage_set
                    .set(group[2].data & (1 << 12) != 0, cd.data, cd.status, now);
                state
                    .dab_link_linkage_set_number
                    .set(group[2].data & 0x0FFF, cd.data, cd.status, now);
            }
            _ => {
                // No other variants currently specified.
            }
        }
        let cd3 = typed_check_data(group, 3);
        state.dab_sid.set(group[3].data, cd3.data, cd3.status, now);
    } else {
        // Ensemble table, 5.3.3.
        let b1: CheckData = group[1].into();
        state.dab_mode.set((group[1].data >> 2) & 0x03, b1.data, b1.status, now);
        let cd2 = typed_check_data(group, 2);
        state.dab_freq.set(
            ((((group[1].data & 0x03) as u32) << 16) | group[2].data as u32) * 16_000,
            cd2.data,
            cd2.status,
            now,
        );
        let cd3 = typed_check_data(group, 3);
        state.dab_eid.set(group[3].data, cd3.data, cd3.status, now);
    }
}

fn decode_open_data_application_init_message(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    match group[3].data {
        0xCD46 | 0xCD47 => decode_tmc_system_information(state, group, now),
        _ => {
            // No other currently supported ODA service uses this initial message.
        }
    }
}

fn decode_open_data_application(state: &mut RdsState, group_type: u16, group: &RdsGroup, now: DateTime<Utc>) {
    let Some(aid) = state.oda_aids.get(&group_type).and_then(|v| v.value().copied()) else {
        return;
    };
    match aid {
        0x93 => decode_dab_reference(state, group, now),
        0xCD46 | 0xCD47 => decode_tmc(state, group, now),
        _ => {
            tracing::warn!(aid, "unknown ODA AID");
        }
    }
}

fn log_tmc_message(msg: &TmcMessage) {
    tracing::debug!(
        duration = msg.duration,
        diversion = msg.diversion,
        negative_direction = msg.negative_direction,
        extent = msg.extent,
        event = msg.event,
        location = msg.location,
        total_extra_groups = msg.total_extra_groups,
        extra_groups = msg.extra.len(),
        "decoded TMC message"
    );
}

fn add_single_group_tmc_message(state: &mut RdsState, msg: TmcMessage, check_data: CheckData) {
    if check_data.status == RdsDecodingStatus::Valid {
        state.tmc_pending_messages().remove(&check_data.data);
        log_tmc_message(&msg);
    } else if state.tmc_pending_messages().remove(&check_data.data).is_some() {
        log_tmc_message(&msg);
    } else {
        state.tmc_pending_messages().insert(
            check_data.data,
            TmcPendingMessage {
                check_data: vec![check_data.data],
                status: check_data.status,
                message: msg,
            },
        );
    }
}

fn add_multigroup_tmc_message(state: &mut RdsState, msg: TmcMessage, check_keys: Vec<u64>, status: RdsDecodingStatus) {
    let key0 = check_keys[0];
    if status == RdsDecodingStatus::Valid {
        state.tmc_pending_messages().remove(&key0);
        log_tmc_message(&msg);
        return;
    }

    match state.tmc_pending_messages().remove(&key0) {
        Some(pending) => {
            let limit = pending.check_data.len().min(check_keys.len());
            let mut matching_groups = 1usize;
            while matching_groups < limit && pending.check_data[matching_groups] == check_keys[matching_groups] {
                matching_groups += 1;
            }
            let mut merged = msg;
            merged.extra.resize(matching_groups, 0);
            log_tmc_message(&merged);
        }
        None => {
            state.tmc_pending_messages().insert(
                key0,
                TmcPendingMessage {
                    check_data: check_keys,
                    status,
                    message: msg,
                },
            );
        }
    }
}

/// Reassembles whatever multi-group fragments arrived for `continuity_index`
/// into a single message (majority vote on the repeated copies), emits it,
/// and clears the fragment buckets regardless of whether assembly succeeded.
/// Ported from `flushTmcMultiGroup`.
fn flush_tmc_multigroup(state: &mut RdsState, continuity_index: usize) {
    let first_entry = state.tmc_multigroups_first()[continuity_index]
        .iter()
        .max_by_key(|(_, g)| g.count)
        .map(|(&k, g)| (k, g.clone()));
    let second_entry = state.tmc_multigroups_second()[continuity_index]
        .iter()
        .max_by_key(|(_, g)| g.count)
        .map(|(&k, g)| (k, g.clone()));

    if let (Some((first_key, first)), Some((second_key, second))) = (first_entry, second_entry) {
        let mut msg = first.message;
        msg.total_extra_groups = second.remaining_groups + 1;
        msg.extra.push(second.data);
        let mut check_keys = vec![first_key, second_key];
        let mut count = first.count.min(second.count);

        for remaining in (0..second.remaining_groups as usize).rev() {
            let next_entry = state.tmc_multigroups_next()[continuity_index][remaining]
                .iter()
                .max_by_key(|(_, g)| g.count)
                .map(|(&k, g)| (k, g.clone()));
            match next_entry {
                Some((next_key, next)) => {
                    msg.extra.push(next.data);
                    check_keys.push(next_key);
                    count = count.min(next.count);
                }
                None => break,
            }
        }

        let status = if count >= 2 {
            RdsDecodingStatus::Valid
        } else {
            RdsDecodingStatus::Corrected
        };
        add_multigroup_tmc_message(state, msg, check_keys, status);
    }

    state.tmc_multigroups_first()[continuity_index].clear();
    state.tmc_multigroups_second()[continuity_index].clear();
    for bucket in state.tmc_multigroups_next()[continuity_index].iter_mut() {
        bucket.clear();
    }
}

fn extract_tmc_message(group: &RdsGroup) -> TmcMessage {
    TmcMessage {
        duration: group[1].data & 0x07,
        diversion: group[2].data & (1 << 15) != 0,
        negative_direction: group[2].data & (1 << 14) != 0,
        extent: (group[2].data >> 11) & 0x07,
        event: group[2].data & 0x7FF,
        location: group[3].data,
        total_extra_groups: 0,
        extra: Vec::new(),
    }
}

fn decode_tmc_single_group(state: &mut RdsState, group: &RdsGroup) {
    let msg = extract_tmc_message(group);
    let check_data = typed_check_data_both(group);
    add_single_group_tmc_message(state, msg, check_data);
}

fn decode_tmc_multigroup(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    let continuity_index = ((group[1].data & 0x07) as i32 - 1) as isize;
    if continuity_index < 0 || continuity_index as usize >= state.tmc_multigroups_first().len() {
        return;
    }
    let continuity_index = continuity_index as usize;
    let check_data = tmc_multigroup_check_data(group);

    if group[2].data & (1 << 15) != 0 {
        let msg = extract_tmc_message(group);
        let count_inc = if check_data.status == RdsDecodingStatus::Valid { 2 } else { 1 };
        let entry = state.tmc_multigroups_first()[continuity_index]
            .entry(check_data.data)
            .or_insert_with(|| TmcFirstGroup {
                message: msg.clone(),
                timestamp: now,
                count: 0,
            });
        entry.timestamp = now;
        entry.count += count_inc;
        entry.message = msg;
        return;
    }

    let remaining_groups = (group[2].data >> 12) & 0x03;
    if remaining_groups as usize >= TMC_MAX_EXTRA_GROUPS_COUNT {
        return;
    }
    let second = group[2].data & (1 << 14) != 0;
    let count_inc = if check_data.status == RdsDecodingStatus::Valid { 2 } else { 1 };
    let data = ((group[2].data & 0x0FFF) as u32) << 16 | group[3].data as u32;

    let total_count = if second {
        let entry = state.tmc_multigroups_second()[continuity_index]
            .entry(check_data.data)
            .or_insert_with(|| TmcSecondGroup {
                message: TmcMessage::default(),
                timestamp: now,
                count: 0,
                remaining_groups,
                data,
            });
        entry.timestamp = now;
        entry.remaining_groups = remaining_groups;
        entry.count += count_inc;
        entry.data = data;
        entry.count
    } else {
        let entry = state.tmc_multigroups_next()[continuity_index][remaining_groups as usize]
            .entry(check_data.data)
            .or_insert_with(|| TmcNextGroup {
                message: TmcMessage::default(),
                timestamp: now,
                count: 0,
                data,
            });
        entry.timestamp = now;
        entry.count += count_inc;
        entry.data = data;
        entry.count
    };

    if remaining_groups == 0 && total_count >= 2 {
        // A valid terminal group for this continuity index: no further
        // fragments are expected this transmission period, so flush now
        // rather than waiting for the immediate-repetition timeout.
        flush_tmc_multigroup(state, continuity_index);
    }
}

fn ensure_tmc_channel(state: &mut RdsState, group: &RdsGroup, index: usize, now: DateTime<Utc>) -> usize {
    let pi = group[index].data;
    let cd = typed_check_data(group, index);
    if let Some(pos) = state
        .tmc_channels
        .iter()
        .position(|c| c.programme_identification.last_value() == Some(&pi))
    {
        state.tmc_channels[pos].programme_identification.set(pi, cd.data, cd.status, now);
        pos
    } else {
        let mut channel = TmcChannel::new();
        channel.programme_identification.set(pi, cd.data, cd.status, now);
        state.tmc_channels.push(channel);
        state.tmc_channels.len() - 1
    }
}

fn decode_tmc_tuning_information(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    let variant_code = group[1].data & 0x0F;

    match variant_code {
        0x04 | 0x05 => {
            let idx = (variant_code - 0x04) as usize * 4;
            let cd2 = typed_check_data(group, 2);
            let cd3 = typed_check_data(group, 3);
            state.tmc_service_provider_name[idx].set((group[2].data >> 8) as u8 as char, cd2.data, cd2.status, now);
            state.tmc_service_provider_name[idx + 1].set(
                (group[2].data & 0xFF) as u8 as char,
                cd2.data,
                cd2.status,
                now,
            );
            state.tmc_service_provider_name[idx + 2].set((group[3].data >> 8) as u8 as char, cd3.data, cd3.status, now);
            state.tmc_service_provider_name[idx + 3].set(
                (group[3].data & 0xFF) as u8 as char,
                cd3.data,
                cd3.status,
                now,
            );
        }
        0x06 => {
            let channel = ensure_tmc_channel(state, group, 3, now);
            add_frequencies(&mut state.tmc_channels[channel].frequencies, group, 2, false, now);
        }
        0x07 => {
            let channel = ensure_tmc_channel(state, group, 3, now);
            let freq = extract_frequency((group[2].data & 0xFF) as u8, false);
            let cd = typed_check_data(group, 2);
            update_frequency(&mut state.tmc_channels[channel].frequencies, freq, cd, now);
        }
        0x08 => {
            if group[2].data != 0 {
                ensure_tmc_channel(state, group, 2, now);
            }
            if group[3].data != 0 {
                ensure_tmc_channel(state, group, 3, now);
            }
        }
        0x09 => {
            let channel = ensure_tmc_channel(state, group, 3, now);
            let cd = typed_check_data(group, 2);
            let ch = &mut state.tmc_channels[channel];
            ch.ltn.set(group[2].data >> 10, cd.data, cd.status, now);
            ch.scope_i13l.set(group[2].data & (1 << 9) != 0, cd.data, cd.status, now);
            ch.scope_national.set(group[2].data & (1 << 8) != 0, cd.data, cd.status, now);
            ch.scope_regional.set(group[2].data & (1 << 7) != 0, cd.data, cd.status, now);
            ch.scope_urban.set(group[2].data & (1 << 6) != 0, cd.data, cd.status, now);
            ch.sid.set(group[2].data & 0x3F, cd.data, cd.status, now);
        }
        _ => {}
    }
}

fn decode_tmc(state: &mut RdsState, group: &RdsGroup, now: DateTime<Utc>) {
    // Partial responses could in principle yield something, but it's not
    // worth the complexity for a message format this redundant.
    if group[2].status < RdsDecodingStatus::Corrected || group[3].status < RdsDecodingStatus::Corrected {
        return;
    }

    let tmc_type = group[1].data & 0x1F;
    if (0x01..=0x06).contains(&tmc_type) {
        decode_tmc_multigroup(state, group, now);
    } else if (0x08..=0x0F).contains(&tmc_type) {
        decode_tmc_single_group(state, group);
    } else if (0x14..=0x19).contains(&tmc_type) {
        decode_tmc_tuning_information(state, group, now);
    } else if group[1].status == RdsDecodingStatus::Valid {
        tracing::warn!(tmc_type, "unknown TMC message type");
    }
}

/// Dispatches a synchronized group into [`RdsState`] by group type
/// (`block_B >> 11`). Ported from `decodeGroup`.
pub fn decode_group(state: &mut RdsState, group: &RdsGroup) {
    let now = Utc::now();
    let group_type = decode_group_common(state, group, now);
    if group[1].status < RdsDecodingStatus::Corrected {
        return;
    }

    match group_type {
        0x00 | 0x01 => decode_group_type_0(state, group_type == 0x01, group, now),
        0x02 | 0x03 => decode_group_type_1(state, group_type == 0x03, group, now),
        0x04 | 0x05 => decode_group_type_2(state, group_type == 0x05, group, now),
        0x06 => decode_group_type_3a(state, group, now),
        0x08 => decode_group_type_4a(state, group, now),
        0x10 => {
            if state.oda_aids.contains_key(&group_type) {
                decode_open_data_application(state, group_type, group, now);
            } else {
                // Legacy mapping for TMC, if ODA isn't used.
                decode_tmc(state, group, now);
            }
        }
        0x14 => decode_group_type_10a(state, group, now),
        0x1C | 0x1D => decode_group_type_14(state, group_type == 0x1D, group, now),
        0x1E => {
            // Not specified by the standard; unexpected in any compliant stream.
            if group[1].status == RdsDecodingStatus::Valid {
                tracing::warn!("group type 0x1E is unexpected");
            }
        }
        0x1F => decode_group_type_15b(state, group, now),
        _ => {
            // Everything else is either a legacy/proprietary format this
            // receiver doesn't implement, or an ODA application.
            if state.oda_aids.contains_key(&group_type) {
                decode_open_data_application(state, group_type, group, now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rds::ecc::RdsDecodingStatus;

    fn block(data: u16, status: RdsDecodingStatus) -> RdsBlock {
        RdsBlock { data, status }
    }

    fn group(a: u16, b: u16, c: u16, d: u16) -> RdsGroup {
        RdsGroup {
            blocks: [
                block(a, RdsDecodingStatus::Valid),
                block(b, RdsDecodingStatus::Valid),
                block(c, RdsDecodingStatus::Valid),
                block(d, RdsDecodingStatus::Valid),
            ],
        }
    }

    #[test]
    fn group_type_0a_assembles_programme_service_name() {
        let mut state = RdsState::new();
        // group type 0 (0x00 << 11), segment 0, PS chars "TE"
        let g = group(0x1234, 0x0000, 0x0000, (b'T' as u16) << 8 | b'E' as u16);
        decode_group(&mut state, &g);
        assert_eq!(state.programme_service_name[0].value(), Some(&'T'));
        assert_eq!(state.programme_service_name[1].value(), Some(&'E'));
        assert_eq!(state.programme_identification.value(), Some(&0x1234));
    }

    #[test]
    fn group_type_2a_assembles_radio_text_and_resets_on_ab_toggle() {
        let mut state = RdsState::new();
        let group_type_2a = 0x04u16 << 11;
        let g = group(0x0000, group_type_2a, (b'A' as u16) << 8 | b'B' as u16, (b'C' as u16) << 8 | b'D' as u16);
        decode_group(&mut state, &g);
        assert_eq!(state.radio_text[0].value(), Some(&'A'));
        assert_eq!(state.radio_text[3].value(), Some(&'D'));

        // Toggle text_ab (bit 4 of block B) -> radio_text should invalidate.
        let toggled = group_type_2a | (1 << 4);
        let g2 = group(0x0000, toggled, (b'X' as u16) << 8 | b'Y' as u16, (b'Z' as u16) << 8 | b'W' as u16);
        decode_group(&mut state, &g2);
        // The old segment-0 slot was invalidated by the toggle before being
        // overwritten by this same call, so it now holds the new value.
        assert_eq!(state.radio_text[0].value(), Some(&'X'));
    }

    #[test]
    fn group_type_4a_decodes_mjd_time() {
        let mut state = RdsState::new();
        let group_type_4a = 0x08u16 << 11;
        // MJD for 2020-01-01 is 58849. hour=12, minute=0.
        let mjd = 58849u32;
        let b = group_type_4a | ((mjd >> 15) & 0x03) as u16;
        let c = ((mjd << 1) & 0xFFFE) as u16;
        let hour = 12u16;
        let minute = 0u16;
        let d = (hour << 12) | (minute << 6);
        let g = group(0x0000, b, c, d);
        decode_group(&mut state, &g);
        let time = state.current_time.value().expect("current_time should decode");
        assert_eq!(time.format("%Y-%m-%d").to_string(), "2020-01-01");
    }

    #[test]
    fn single_group_tmc_commits_on_second_valid_copy() {
        let mut state = RdsState::new();
        let group_type_legacy_tmc = 0x10u16 << 11;
        let tmc_type_single = 0x08u16;
        let b = group_type_legacy_tmc | tmc_type_single;
        let g = group(0x0000, b, 0x1234, 0x5678);
        // First corrected copy just buffers the pending message.
        let mut corrected_group = g;
        corrected_group.blocks[2].status = RdsDecodingStatus::Corrected;
        corrected_group.blocks[3].status = RdsDecodingStatus::Corrected;
        decode_group(&mut state, &corrected_group);
        assert!(!state.tmc_pending_messages().is_empty());
        // A second (here: Valid) copy commits and clears the pending entry.
        decode_group(&mut state, &g);
        assert!(state.tmc_pending_messages().is_empty());
    }

    #[test]
    fn multigroup_tmc_flushes_on_terminal_group() {
        let mut state = RdsState::new();
        let group_type_legacy_tmc = 0x10u16 << 11;
        let continuity_index_field = 1u16; // continuity_index = 0

        // First group: bit 15 of block C set.
        let b_first = group_type_legacy_tmc | continuity_index_field;
        let c_first = 1 << 15;
        let g_first = group(0x0000, b_first, c_first, 0x0042);
        decode_group(&mut state, &g_first);
        assert!(!state.tmc_multigroups_first()[0].is_empty());

        // Terminal "second" group: remaining_groups = 0, bit14 set (second flag).
        let c_second = (1 << 14) | 0x0000; // remaining_groups bits 12-13 = 0
        let g_second = group(0x0000, b_first, c_second, 0x0007);
        decode_group(&mut state, &g_second);
        // First call only brings count to 1 (Valid -> +2 actually), so a
        // single Valid copy already reaches count >= 2 and flushes.
        assert!(state.tmc_multigroups_first()[0].is_empty());
        assert!(state.tmc_multigroups_second()[0].is_empty());
    }
}
