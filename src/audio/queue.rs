use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::{error::PlayerError, sources::Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl RepeatMode {
    /// Off → Track → Queue → Off
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Track,
            RepeatMode::Track => RepeatMode::Queue,
            RepeatMode::Queue => RepeatMode::Off,
        }
    }
}

/// Cola FIFO de una guild junto con la historia de la época actual.
///
/// `history` guarda cada track encolado desde el último vaciado explícito y es
/// lo que se reproduce de nuevo con [`RepeatMode::Queue`]. Nunca supera
/// `max_size`, así que una repetición no desborda la cola.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<Track>,
    history: Vec<Track>,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            history: Vec::new(),
            max_size,
        }
    }

    /// Agrega un track al final de la cola y de la historia.
    /// Devuelve la posición (1-based) que ocupa.
    pub fn push(&mut self, track: Track) -> Result<usize, PlayerError> {
        if self.items.len() >= self.max_size {
            return Err(PlayerError::QueueFull(self.max_size));
        }

        debug!("➕ Agregado a la cola: {}", track.title());
        if self.history.len() < self.max_size {
            self.history.push(track.clone());
        }
        self.items.push_back(track);
        Ok(self.items.len())
    }

    /// Saca el siguiente track (FIFO estricto)
    pub fn pop_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Inserta al frente sin tocar la historia (repetición y restauración)
    pub fn push_front(&mut self, track: Track) {
        self.items.push_front(track);
    }

    /// Reemplaza la cola por una copia de la historia en orden original
    pub fn replay_history(&mut self) -> usize {
        self.items = self.history.iter().cloned().collect();
        info!("🔁 Repitiendo la cola completa ({} canciones)", self.items.len());
        self.items.len()
    }

    /// Vacía la cola y cierra la época. Devuelve cuántos se eliminaron.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        self.history.clear();
        info!("🗑️ Cola limpiada: {} tracks removidos", removed);
        removed
    }

    /// Termina la época actual sin tocar la cola
    pub fn end_epoch(&mut self) {
        self.history.clear();
    }

    /// Elimina la posición `index` (1-based)
    pub fn remove_at(&mut self, index: usize) -> Result<Track, PlayerError> {
        self.check_position(index)?;
        let track = self
            .items
            .remove(index - 1)
            .ok_or(PlayerError::OutOfRange { len: self.items.len() })?;
        debug!("❌ Track eliminado en posición {}", index);
        Ok(track)
    }

    /// Mueve un track de `from` a `to` (ambos 1-based)
    pub fn move_at(&mut self, from: usize, to: usize) -> Result<&Track, PlayerError> {
        self.check_position(from)?;
        self.check_position(to)?;

        if from != to {
            let track = self
                .items
                .remove(from - 1)
                .ok_or(PlayerError::OutOfRange { len: self.items.len() })?;
            self.items.insert(to - 1, track);
            debug!("📍 Track movido de posición {} a {}", from, to);
        }

        self.items
            .get(to - 1)
            .ok_or(PlayerError::OutOfRange { len: self.items.len() })
    }

    /// Mezcla la cola. Devuelve cuántos tracks se mezclaron.
    pub fn shuffle(&mut self) -> Result<usize, PlayerError> {
        if self.items.len() <= 1 {
            return Err(PlayerError::TooFewToShuffle);
        }

        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada");
        Ok(self.items.len())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_history(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    /// Copia ordenada del contenido actual
    pub fn to_vec(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    /// Reemplaza el contenido (restauración de sesión)
    pub fn restore(&mut self, tracks: Vec<Track>) {
        self.history = tracks.iter().take(self.max_size).cloned().collect();
        self.items = tracks.into();
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().map(Track::duration).sum()
    }

    fn check_position(&self, index: usize) -> Result<(), PlayerError> {
        if index < 1 || index > self.items.len() {
            return Err(PlayerError::OutOfRange { len: self.items.len() });
        }
        Ok(())
    }
}

/// Vista de sólo lectura de la cola de una guild para la UI
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub now_playing: Option<Track>,
    pub items: Vec<Track>,
    pub repeat_mode: RepeatMode,
    pub volume: f32,
    pub paused: bool,
    pub total_duration: Duration,
}

impl QueueSnapshot {
    /// Obtiene una página específica de la cola (1-based)
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let total_pages = self.items.len().div_ceil(items_per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * items_per_page;
        let end = (start + items_per_page).min(self.items.len());

        QueuePage {
            items: self.items[start..end].to_vec(),
            first_position: start + 1,
            current_page,
            total_pages,
            total_items: self.items.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}
