//! Display Name Generation
//!
//! Friendly `AdjectiveNoun123` names for the scoreboard. Names are not
//! unique; the player id is the identity.

use crate::core::rng::DeterministicRng;

const ADJECTIVES: &[&str] = &[
    "Amber", "Brisk", "Cobalt", "Dusty", "Eager", "Fuzzy", "Gentle", "Hasty",
    "Icy", "Jolly", "Keen", "Lunar", "Misty", "Nimble", "Oaken", "Plucky",
    "Quirky", "Rusty", "Solar", "Tidy", "Urban", "Vivid", "Witty", "Zesty",
];

const NOUNS: &[&str] = &[
    "Badger", "Canyon", "Dingo", "Ember", "Ferret", "Glacier", "Heron", "Island",
    "Jackal", "Kettle", "Lantern", "Meadow", "Otter", "Pebble", "Quartz", "Rocket",
    "Sapper", "Tundra", "Walrus", "Yeti", "Marmot", "Compass", "Beetle", "Harbor",
];

/// Produce a display name such as `NimbleOtter427`.
///
/// The trailing number is in `100..=999`.
pub fn generate_display_name(rng: &mut DeterministicRng) -> String {
    let adjective = rng.choose(ADJECTIVES).copied().unwrap_or("Anonymous");
    let noun = rng.choose(NOUNS).copied().unwrap_or("Player");
    let number = 100 + rng.next_int(900);
    format!("{}{}{}", adjective, noun, number)
}
