//! Estado de reproducción por guild.
//!
//! Tres piezas:
//! - [`queue`]: la cola pura (`TrackQueue`), con la semántica de loops
//!   y el historial para el loop de cola.
//! - [`registry`]: el mapa proceso-global guild → cola, con las reglas de
//!   creación y teardown atadas a la sesión de voz.
//! - [`driver`]: la máquina de transiciones que encadena un track con el
//!   siguiente a partir de la señal de fin de songbird.

pub mod driver;
pub mod queue;
pub mod registry;
