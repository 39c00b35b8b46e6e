//! The 50 US states: postal abbreviation, full name, and FIPS code.
//!
//! DC and the territories are deliberately absent; the cleaned datasets only
//! cover the 50 states.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    pub abbr: &'static str,
    pub name: &'static str,
    pub fips: i64,
}

pub const STATES: [State; 50] = [
    State { abbr: "AL", name: "Alabama", fips: 1 },
    State { abbr: "AK", name: "Alaska", fips: 2 },
    State { abbr: "AZ", name: "Arizona", fips: 4 },
    State { abbr: "AR", name: "Arkansas", fips: 5 },
    State { abbr: "CA", name: "California", fips: 6 },
    State { abbr: "CO", name: "Colorado", fips: 8 },
    State { abbr: "CT", name: "Connecticut", fips: 9 },
    State { abbr: "DE", name: "Delaware", fips: 10 },
    State { abbr: "FL", name: "Florida", fips: 12 },
    State { abbr: "GA", name: "Georgia", fips: 13 },
    State { abbr: "HI", name: "Hawaii", fips: 15 },
    State { abbr: "ID", name: "Idaho", fips: 16 },
    State { abbr: "IL", name: "Illinois", fips: 17 },
    State { abbr: "IN", name: "Indiana", fips: 18 },
    State { abbr: "IA", name: "Iowa", fips: 19 },
    State { abbr: "KS", name: "Kansas", fips: 20 },
    State { abbr: "KY", name: "Kentucky", fips: 21 },
    State { abbr: "LA", name: "Louisiana", fips: 22 },
    State { abbr: "ME", name: "Maine", fips: 23 },
    State { abbr: "MD", name: "Maryland", fips: 24 },
    State { abbr: "MA", name: "Massachusetts", fips: 25 },
    State { abbr: "MI", name: "Michigan", fips: 26 },
    State { abbr: "MN", name: "Minnesota", fips: 27 },
    State { abbr: "MS", name: "Mississippi", fips: 28 },
    State { abbr: "MO", name: "Missouri", fips: 29 },
    State { abbr: "MT", name: "Montana", fips: 30 },
    State { abbr: "NE", name: "Nebraska", fips: 31 },
    State { abbr: "NV", name: "Nevada", fips: 32 },
    State { abbr: "NH", name: "New Hampshire", fips: 33 },
    State { abbr: "NJ", name: "New Jersey", fips: 34 },
    State { abbr: "NM", name: "New Mexico", fips: 35 },
    State { abbr: "NY", name: "New York", fips: 36 },
    State { abbr: "NC", name: "North Carolina", fips: 37 },
    State { abbr: "ND", name: "North Dakota", fips: 38 },
    State { abbr: "OH", name: "Ohio", fips: 39 },
    State { abbr: "OK", name: "Oklahoma", fips: 40 },
    State { abbr: "OR", name: "Oregon", fips: 41 },
    State { abbr: "PA", name: "Pennsylvania", fips: 42 },
    State { abbr: "RI", name: "Rhode Island", fips: 44 },
    State { abbr: "SC", name: "South Carolina", fips: 45 },
    State { abbr: "SD", name: "South Dakota", fips: 46 },
    State { abbr: "TN", name: "Tennessee", fips: 47 },
    State { abbr: "TX", name: "Texas", fips: 48 },
    State { abbr: "UT", name: "Utah", fips: 49 },
    State { abbr: "VT", name: "Vermont", fips: 50 },
    State { abbr: "VA", name: "Virginia", fips: 51 },
    State { abbr: "WA", name: "Washington", fips: 53 },
    State { abbr: "WV", name: "West Virginia", fips: 54 },
    State { abbr: "WI", name: "Wisconsin", fips: 55 },
    State { abbr: "WY", name: "Wyoming", fips: 56 },
];

pub fn by_abbr(abbr: &str) -> Option<&'static State> {
    let abbr = abbr.trim();
    STATES.iter().find(|s| s.abbr.eq_ignore_ascii_case(abbr))
}

pub fn by_name(name: &str) -> Option<&'static State> {
    let name = name.trim();
    STATES.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}
