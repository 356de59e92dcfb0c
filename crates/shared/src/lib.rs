use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod sync;

pub use sync::{SyncMessage, SyncPayload, Topic};

/// Идентификатор вершины: индекс в текущих буферах провайдера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub u32);

/// Идентификатор грани (треугольник или четырёхугольник)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceId(pub u32);

/// Идентификатор ребра
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

macro_rules! impl_index {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// Индекс элемента как usize
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }

            impl From<usize> for $ty {
                fn from(index: usize) -> Self {
                    Self(index as u32)
                }
            }

            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

impl_index!(VertexId, FaceId, EdgeId);

/// Тип элемента сетки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Vertex,
    Face,
    Edge,
}

/// Ссылка на конкретный элемент сетки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ElementRef {
    Vertex(VertexId),
    Face(FaceId),
    Edge(EdgeId),
}

impl ElementRef {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementRef::Vertex(_) => ElementKind::Vertex,
            ElementRef::Face(_) => ElementKind::Face,
            ElementRef::Edge(_) => ElementKind::Edge,
        }
    }

    /// Сырой индекс элемента
    pub fn index(&self) -> usize {
        match self {
            ElementRef::Vertex(id) => id.index(),
            ElementRef::Face(id) => id.index(),
            ElementRef::Edge(id) => id.index(),
        }
    }

    pub fn as_face(&self) -> Option<FaceId> {
        match self {
            ElementRef::Face(id) => Some(*id),
            _ => None,
        }
    }
}

/// Уникальный идентификатор окна просмотра (источник sync-сообщений)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewportId(pub Uuid);

impl ViewportId {
    /// Новый случайный идентификатор
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ViewportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Группа диагностических значений от движка геометрии
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DebugGroup {
    pub name: String,
    /// Пары ключ → значение в порядке вывода
    pub entries: Vec<(String, String)>,
}

impl DebugGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entries.push((key.into(), value.to_string()));
        self
    }
}
