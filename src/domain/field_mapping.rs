//! Declarative mapping from external statistics-export columns to internal
//! storage columns.
//!
//! [`FIELD_MAPPINGS`] is the schema contract between uploaded files and the
//! `player_stats` table: every persisted statistic column is named here, and
//! renaming a column means editing this table rather than ad hoc parsing code.
//! Several external headers may resolve to the same internal column (aliases);
//! the first entry for a column is its canonical header.

use serde::Serialize;
use utoipa::ToSchema;

/// How a raw field value is coerced before storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Identity or label text; trimmed only.
    Text,
    /// Integer count; thousands separators stripped, 0 on failure.
    Count,
    /// Money amount; currency symbols and separators stripped, 0.0 on failure.
    Currency,
    /// Percentage or ratio; optional `%` suffix, 0.0 on failure.
    Decimal,
}

/// Semantic grouping of a statistic, used for display catalogues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatGroup {
    /// Player identity and volume.
    General,
    /// Before the flop.
    Preflop,
    /// Flop, turn and river play.
    Postflop,
    /// Showdown tendencies.
    Showdown,
    /// Money and win-rate results.
    Winnings,
}

/// One row of the mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Header name as it appears in uploaded files.
    pub header: &'static str,
    /// Internal column name.
    pub column: &'static str,
    /// Semantic group.
    pub group: StatGroup,
    /// Coercion rule.
    pub kind: ValueKind,
    /// Optional label for dashboards.
    pub display: Option<&'static str>,
}

impl FieldSpec {
    /// Returns the display label, falling back to the header.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.display.unwrap_or(self.header)
    }

    /// Whether values of this field are stored numerically.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        !matches!(self.kind, ValueKind::Text)
    }
}

const fn field(
    header: &'static str,
    column: &'static str,
    group: StatGroup,
    kind: ValueKind,
) -> FieldSpec {
    FieldSpec {
        header,
        column,
        group,
        kind,
        display: None,
    }
}

const fn labelled(
    header: &'static str,
    column: &'static str,
    group: StatGroup,
    kind: ValueKind,
    display: &'static str,
) -> FieldSpec {
    FieldSpec {
        header,
        column,
        group,
        kind,
        display: Some(display),
    }
}

use self::StatGroup::{General, Postflop, Preflop, Showdown, Winnings};
use self::ValueKind::{Count, Currency, Decimal, Text};

/// Internal column holding the player identity.
pub const PLAYER_COLUMN: &str = "player_name";
/// Internal column holding the raw site label.
pub const SITE_COLUMN: &str = "site";
/// Internal column holding the hand count.
pub const HANDS_COLUMN: &str = "hands";
/// Internal column holding the headline win rate.
pub const HEADLINE_RATE_COLUMN: &str = "bb_per_100";

/// The authoritative external → internal column table.
pub static FIELD_MAPPINGS: &[FieldSpec] = &[
    // identity
    field("Player", PLAYER_COLUMN, General, Text),
    field("Player Name", PLAYER_COLUMN, General, Text),
    field("Site", SITE_COLUMN, General, Text),
    field("Room", SITE_COLUMN, General, Text),
    // volume
    field("Hands", HANDS_COLUMN, General, Count),
    field("Hands Played", HANDS_COLUMN, General, Count),
    labelled("Flops Seen", "flops_seen", General, Count, "Flops Seen"),
    field("Showdowns", "showdowns", Showdown, Count),
    labelled("All-Ins", "all_ins", General, Count, "All-In Hands"),
    // winnings
    labelled("BB/100", HEADLINE_RATE_COLUMN, Winnings, Decimal, "Win Rate (bb/100)"),
    labelled("EV BB/100", "ev_bb_per_100", Winnings, Decimal, "EV Win Rate (bb/100)"),
    labelled("All-In Adj BB/100", "allin_adj_bb_per_100", Winnings, Decimal, "All-In Adjusted bb/100"),
    labelled("Total Won", "total_won", Winnings, Currency, "Net Won"),
    field("Net Won", "total_won", Winnings, Currency),
    labelled("EV Won", "ev_won", Winnings, Currency, "All-In EV Won"),
    field("Rake", "rake", Winnings, Currency),
    labelled("Showdown Won", "showdown_won", Winnings, Currency, "Blue Line"),
    labelled("Non-Showdown Won", "non_showdown_won", Winnings, Currency, "Red Line"),
    // preflop
    labelled("VPIP", "vpip", Preflop, Decimal, "VPIP %"),
    labelled("PFR", "pfr", Preflop, Decimal, "PFR %"),
    labelled("3Bet", "three_bet", Preflop, Decimal, "3-Bet %"),
    field("3-Bet", "three_bet", Preflop, Decimal),
    labelled("Fold to 3Bet", "fold_to_three_bet", Preflop, Decimal, "Fold to 3-Bet %"),
    field("Fold to 3-Bet", "fold_to_three_bet", Preflop, Decimal),
    labelled("4Bet", "four_bet", Preflop, Decimal, "4-Bet %"),
    field("4-Bet", "four_bet", Preflop, Decimal),
    labelled("Fold to 4Bet", "fold_to_four_bet", Preflop, Decimal, "Fold to 4-Bet %"),
    field("Cold Call", "cold_call", Preflop, Decimal),
    field("Squeeze", "squeeze", Preflop, Decimal),
    labelled("Limp", "limp", Preflop, Decimal, "Open Limp %"),
    labelled("Steal", "steal", Preflop, Decimal, "Attempt to Steal %"),
    field("Fold BB to Steal", "fold_bb_to_steal", Preflop, Decimal),
    field("Fold SB to Steal", "fold_sb_to_steal", Preflop, Decimal),
    labelled("3Bet vs Steal", "three_bet_vs_steal", Preflop, Decimal, "3-Bet vs Steal %"),
    // postflop
    labelled("CBet Flop", "cbet_flop", Postflop, Decimal, "Flop C-Bet %"),
    field("C-Bet Flop", "cbet_flop", Postflop, Decimal),
    labelled("CBet Turn", "cbet_turn", Postflop, Decimal, "Turn C-Bet %"),
    field("C-Bet Turn", "cbet_turn", Postflop, Decimal),
    labelled("CBet River", "cbet_river", Postflop, Decimal, "River C-Bet %"),
    labelled("Fold to CBet Flop", "fold_to_cbet_flop", Postflop, Decimal, "Fold to Flop C-Bet %"),
    field("Fold to C-Bet Flop", "fold_to_cbet_flop", Postflop, Decimal),
    labelled("Fold to CBet Turn", "fold_to_cbet_turn", Postflop, Decimal, "Fold to Turn C-Bet %"),
    labelled("Raise CBet Flop", "raise_cbet_flop", Postflop, Decimal, "Raise Flop C-Bet %"),
    field("Check-Raise Flop", "check_raise_flop", Postflop, Decimal),
    labelled("Donk Flop", "donk_flop", Postflop, Decimal, "Flop Donk Bet %"),
    field("Float Flop", "float_flop", Postflop, Decimal),
    labelled("Probe Turn", "probe_turn", Postflop, Decimal, "Turn Probe %"),
    labelled("Bet River", "bet_river", Postflop, Decimal, "River Bet %"),
    field("Fold to River Bet", "fold_to_river_bet", Postflop, Decimal),
    labelled("Overbet", "overbet", Postflop, Decimal, "Overbet %"),
    labelled("AF", "aggression_factor", Postflop, Decimal, "Aggression Factor"),
    labelled("AFq", "aggression_frequency", Postflop, Decimal, "Aggression Frequency %"),
    labelled("Flop Seen", "flop_seen_pct", Postflop, Decimal, "Flops Seen %"),
    // showdown
    labelled("WTSD", "wtsd", Showdown, Decimal, "Went to Showdown %"),
    labelled("W$SD", "wsd", Showdown, Decimal, "Won $ at Showdown %"),
    labelled("WWSF", "wwsf", Showdown, Decimal, "Won When Saw Flop %"),
    labelled("W$WSF", "won_when_saw_flop_money", Showdown, Decimal, "Won $ When Saw Flop %"),
];

/// Internal columns every upload must provide, reported by canonical header.
pub const REQUIRED_COLUMNS: &[&str] = &[
    PLAYER_COLUMN,
    SITE_COLUMN,
    HANDS_COLUMN,
    HEADLINE_RATE_COLUMN,
    "vpip",
    "pfr",
];

/// Lookup facade over [`FIELD_MAPPINGS`].
#[derive(Debug, Clone, Copy)]
pub struct FieldMappingTable {
    specs: &'static [FieldSpec],
}

impl Default for FieldMappingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldMappingTable {
    /// Returns the table backed by [`FIELD_MAPPINGS`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            specs: FIELD_MAPPINGS,
        }
    }

    /// Resolves an external header name, ignoring case and surrounding or
    /// repeated whitespace. Returns `None` for unmapped headers.
    #[must_use]
    pub fn resolve(&self, header: &str) -> Option<&'static FieldSpec> {
        let wanted = normalize_header(header);
        self.specs
            .iter()
            .find(|spec| normalize_header(spec.header) == wanted)
    }

    /// Every row of the table, aliases included, in table order.
    #[must_use]
    pub const fn specs(&self) -> &'static [FieldSpec] {
        self.specs
    }

    /// Returns the canonical (first-listed) spec for an internal column.
    #[must_use]
    pub fn canonical(&self, column: &str) -> Option<&'static FieldSpec> {
        self.specs.iter().find(|spec| spec.column == column)
    }

    /// Canonical specs of all numeric columns, one per column, in table order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        self.specs.iter().enumerate().filter_map(|(i, spec)| {
            let first = self
                .specs
                .iter()
                .position(|other| other.column == spec.column);
            (spec.is_numeric() && first == Some(i)).then_some(spec)
        })
    }

    /// Canonical header names for the required columns.
    #[must_use]
    pub fn required_headers(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .map(|column| self.canonical(column).map_or(*column, |spec| spec.header))
            .collect()
    }
}

fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// Known site labels and the canonical room code each maps to.
static SITE_ROOMS: &[(&str, &str)] = &[
    ("xpk", "XPK"),
    ("x-poker", "XPK"),
    ("xpoker", "XPK"),
    ("gg", "GG"),
    ("ggpoker", "GG"),
    ("gg network", "GG"),
    ("ps", "PS"),
    ("pokerstars", "PS"),
    ("wpt", "WPT"),
    ("wpt global", "WPT"),
    ("ipoker", "IPK"),
    ("888", "888"),
    ("888poker", "888"),
    ("winamax", "WNX"),
    ("partypoker", "PP"),
    ("coinpoker", "CP"),
    ("acr", "ACR"),
    ("americas cardroom", "ACR"),
];

/// Maps a raw site label to its canonical room code.
///
/// Unknown labels fall back to the trimmed, upper-cased label. Returns
/// `None` for blank input.
#[must_use]
pub fn room_code_for(site: &str) -> Option<String> {
    let trimmed = site.trim();
    if trimmed.is_empty() {
        return None;
    }
    let wanted = normalize_header(trimmed);
    let code = SITE_ROOMS
        .iter()
        .find(|(label, _)| *label == wanted)
        .map_or_else(|| trimmed.to_ascii_uppercase(), |(_, code)| (*code).to_string());
    Some(code)
}
