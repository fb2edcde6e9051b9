//! Static equippable definitions shared by server combat and client weapon
//! handling.

/// Sentinel `equipped_item_id` meaning empty hands.
pub const NO_ITEM: i32 = -1;

/// Item bound to the primary slot key.
pub const PRIMARY_ITEM: i32 = 1;
/// Item bound to the secondary slot key.
pub const SECONDARY_ITEM: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GunStats {
    pub damage: i32,
    /// Maximum effective distance in world units.
    pub range: f32,
    /// Rounds per second.
    pub fire_rate: f32,
    pub magazine_size: u32,
    /// Seconds.
    pub reload_time: f32,
}

impl GunStats {
    /// Minimum seconds between two shots.
    pub fn fire_interval(&self) -> f32 {
        1.0 / self.fire_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemKind {
    Gun(GunStats),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemDefinition {
    pub id: i32,
    pub name: &'static str,
    pub kind: ItemKind,
}

impl ItemDefinition {
    pub fn gun(&self) -> Option<&GunStats> {
        match &self.kind {
            ItemKind::Gun(stats) => Some(stats),
        }
    }
}

pub const ITEMS: [ItemDefinition; 2] = [
    ItemDefinition {
        id: 0,
        name: "Colt",
        kind: ItemKind::Gun(GunStats {
            damage: 12,
            range: 65.0,
            fire_rate: 7.0,
            magazine_size: 7,
            reload_time: 1.5,
        }),
    },
    ItemDefinition {
        id: 1,
        name: "AK-47",
        kind: ItemKind::Gun(GunStats {
            damage: 30,
            range: 150.0,
            fire_rate: 10.0,
            magazine_size: 30,
            reload_time: 2.5,
        }),
    },
];

pub fn item(id: i32) -> Option<&'static ItemDefinition> {
    ITEMS.iter().find(|item| item.id == id)
}

/// Gun stats for `id`, or `None` for unknown ids and non-gun items.
pub fn gun(id: i32) -> Option<&'static GunStats> {
    item(id).and_then(ItemDefinition::gun)
}
