// Widget rendering for the lobby and room views.

pub mod deck;
pub mod room_list;
pub mod roster;
pub mod status_bar;
pub mod summary;
