//! Tiled Game of Life across screens placed edge to edge.
//!
//! Each device runs its own grid. Two devices swiped together along an edge
//! pair up, agree on which border cells face each other, and from then on
//! exchange those cells every generation behind a two-phase barrier, so a
//! pattern walks across the seam as if the screens were one surface.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`geometry`] | Swipe samples and the border overlap between two screens |
//! | [`grid`] | Local grid with a ghost ring and the double-buffered step |
//! | [`link`] | Per-neighbor round flags and the neighbor table |
//! | [`pairing`] | Matching coincident swipes into links |
//! | [`engine`] | Generation worker and barrier rounds |
//! | [`router`] | Inbound message dispatch |
//! | [`message`] | Wire message kinds |
//! | [`state`] | The wired device context |
//! | [`config`] | Device identity and tunables |
//! | [`event`] | Notifications for a renderer |
//! | [`transport`] | Pub/sub interface, in-memory bus and relay client |
//! | [`relay`] | Websocket relay broker |

pub mod config;
pub mod engine;
pub mod event;
pub mod geometry;
pub mod grid;
pub mod link;
pub mod message;
pub mod pairing;
pub mod relay;
pub mod router;
pub mod state;
pub mod transport;
