/// Terrain and item types and their properties.
/// Properties are queried via methods, not stored as flags,
/// so tile semantics are centralized here.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Terrain {
    #[default]
    Ground,
    Grass,
    Marble,
    Wood,
    WoodCreaky, // Makes noise when stepped on
    Water,      // Splashes
    Wall,
    Hedge,
    Door,       // Passable, blocks sight
    Window,     // Leap over only
    Portcullis, // Opens for the vault key
    Exit,
}

impl Terrain {
    /// Does this terrain stop a line of sight?
    pub fn blocks_sight(self) -> bool {
        matches!(self, Terrain::Wall | Terrain::Hedge | Terrain::Door)
    }

    /// Can a guard stand here?
    pub fn blocks_guard(self) -> bool {
        matches!(self, Terrain::Wall | Terrain::Hedge | Terrain::Window | Terrain::Portcullis)
    }

    /// Can the player stand here? The portcullis yields to the vault key.
    pub fn blocks_player(self, has_vault_key: bool) -> bool {
        match self {
            Terrain::Wall | Terrain::Hedge | Terrain::Window => true,
            Terrain::Portcullis => !has_vault_key,
            _ => false,
        }
    }

    /// Can the player pass over this cell in the middle of a leap?
    pub fn leapable(self) -> bool {
        !matches!(self, Terrain::Wall | Terrain::Hedge | Terrain::Door | Terrain::Portcullis)
    }

    /// Terrain never hides its occupant; hiding comes from items.
    pub fn hides_occupant(self) -> bool {
        false
    }

    pub fn is_water(self) -> bool {
        matches!(self, Terrain::Water)
    }

    pub fn is_creaky(self) -> bool {
        matches!(self, Terrain::WoodCreaky)
    }

    pub fn is_door(self) -> bool {
        matches!(self, Terrain::Door)
    }

    pub fn is_exit(self) -> bool {
        matches!(self, Terrain::Exit)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ItemKind {
    Coin,
    Bush,
    Table,
    TorchLit,
    TorchUnlit,
}

impl ItemKind {
    pub fn hides_occupant(self) -> bool {
        matches!(self, ItemKind::Bush | ItemKind::Table)
    }

    pub fn blocks_guard(self) -> bool {
        matches!(self, ItemKind::Table | ItemKind::TorchLit | ItemKind::TorchUnlit)
    }

    pub fn blocks_player(self) -> bool {
        matches!(self, ItemKind::TorchLit | ItemKind::TorchUnlit)
    }

    pub fn is_light_source(self) -> bool {
        matches!(self, ItemKind::TorchLit)
    }
}
