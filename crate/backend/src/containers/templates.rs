//! Generic C container templates
//!
//! Plain text with `{{T}}` / `{{K}}` / `{{V}}` / `{{SUFFIX}}` placeholders
//! and ownership-sensitive conditional blocks selected by the element
//! descriptors. Each family exposes the same eight operations (construct,
//! destroy, push/insert, remove, lookup/contains, at/get, size, iterate)
//! plus the equality and by-value drop helpers nested containers need.

/// Growable array family (`list[T]` → `vec_T`)
pub const VEC_HEADER: &str = r#"typedef struct {
    {{T}}* data;
    size_t len;
    size_t cap;
} {{SUFFIX}};

{{SUFFIX}} {{SUFFIX}}_new(void);
void {{SUFFIX}}_destroy({{SUFFIX}}* v);
void {{SUFFIX}}_drop({{SUFFIX}} v);
void {{SUFFIX}}_push({{SUFFIX}}* v, {{T}} value);
void {{SUFFIX}}_remove({{SUFFIX}}* v, size_t index);
bool {{SUFFIX}}_contains(const {{SUFFIX}}* v, {{T}} value);
{{T}} {{SUFFIX}}_at(const {{SUFFIX}}* v, size_t index);
size_t {{SUFFIX}}_size(const {{SUFFIX}}* v);
{{T}}* {{SUFFIX}}_items({{SUFFIX}}* v);
bool {{SUFFIX}}_eq(const {{SUFFIX}}* a, const {{SUFFIX}}* b);
"#;

pub const VEC_SOURCE: &str = r#"static bool {{SUFFIX}}_elem_eq({{T}} a, {{T}} b) {
    return {{T_EQ_BODY}};
}

{{SUFFIX}} {{SUFFIX}}_new(void) {
    {{SUFFIX}} v = {NULL, 0, 0};
    return v;
}

static void {{SUFFIX}}_reserve({{SUFFIX}}* v, size_t need) {
    if (v->cap >= need) {
        return;
    }
    size_t cap = v->cap == 0 ? 8 : v->cap * 2;
    while (cap < need) {
        cap *= 2;
    }
    v->data = ({{T}}*)realloc(v->data, cap * sizeof({{T}}));
    v->cap = cap;
}

void {{SUFFIX}}_destroy({{SUFFIX}}* v) {
{{#T_NEEDS_DROP}}    for (size_t i = 0; i < v->len; i++) {
        {{T_DROP_FN}}(v->data[i]);
    }
{{/T_NEEDS_DROP}}    free(v->data);
    v->data = NULL;
    v->len = 0;
    v->cap = 0;
}

void {{SUFFIX}}_drop({{SUFFIX}} v) {
    {{SUFFIX}}_destroy(&v);
}

void {{SUFFIX}}_push({{SUFFIX}}* v, {{T}} value) {
    {{SUFFIX}}_reserve(v, v->len + 1);
    v->data[v->len++] = {{#T_NEEDS_COPY}}{{T_COPY_FN}}(value){{/T_NEEDS_COPY}}{{#T_PLAIN_COPY}}value{{/T_PLAIN_COPY}};
}

void {{SUFFIX}}_remove({{SUFFIX}}* v, size_t index) {
    if (index >= v->len) {
        return;
    }
{{#T_NEEDS_DROP}}    {{T_DROP_FN}}(v->data[index]);
{{/T_NEEDS_DROP}}    for (size_t i = index; i + 1 < v->len; i++) {
        v->data[i] = v->data[i + 1];
    }
    v->len--;
}

bool {{SUFFIX}}_contains(const {{SUFFIX}}* v, {{T}} value) {
    for (size_t i = 0; i < v->len; i++) {
        if ({{SUFFIX}}_elem_eq(v->data[i], value)) {
            return true;
        }
    }
    return false;
}

{{T}} {{SUFFIX}}_at(const {{SUFFIX}}* v, size_t index) {
    assert(index < v->len);
    return v->data[index];
}

size_t {{SUFFIX}}_size(const {{SUFFIX}}* v) {
    return v->len;
}

{{T}}* {{SUFFIX}}_items({{SUFFIX}}* v) {
    return v->data;
}

bool {{SUFFIX}}_eq(const {{SUFFIX}}* a, const {{SUFFIX}}* b) {
    if (a->len != b->len) {
        return false;
    }
    for (size_t i = 0; i < a->len; i++) {
        if (!{{SUFFIX}}_elem_eq(a->data[i], b->data[i])) {
            return false;
        }
    }
    return true;
}
"#;

/// Ordered association family (`dict[K, V]` → `map_K_V`)
pub const MAP_HEADER: &str = r#"typedef struct {
    {{K}}* keys;
    {{V}}* values;
    size_t len;
    size_t cap;
} {{SUFFIX}};

{{SUFFIX}} {{SUFFIX}}_new(void);
void {{SUFFIX}}_destroy({{SUFFIX}}* m);
void {{SUFFIX}}_drop({{SUFFIX}} m);
void {{SUFFIX}}_insert({{SUFFIX}}* m, {{K}} key, {{V}} value);
void {{SUFFIX}}_remove({{SUFFIX}}* m, {{K}} key);
bool {{SUFFIX}}_contains(const {{SUFFIX}}* m, {{K}} key);
{{V}}* {{SUFFIX}}_get({{SUFFIX}}* m, {{K}} key);
size_t {{SUFFIX}}_size(const {{SUFFIX}}* m);
{{K}}* {{SUFFIX}}_keys({{SUFFIX}}* m);
bool {{SUFFIX}}_eq({{SUFFIX}}* a, {{SUFFIX}}* b);
"#;

pub const MAP_SOURCE: &str = r#"static bool {{SUFFIX}}_key_eq({{K}} a, {{K}} b) {
    return {{K_EQ_BODY}};
}

static bool {{SUFFIX}}_value_eq({{V}} a, {{V}} b) {
    return {{V_EQ_BODY}};
}

{{SUFFIX}} {{SUFFIX}}_new(void) {
    {{SUFFIX}} m = {NULL, NULL, 0, 0};
    return m;
}

static void {{SUFFIX}}_reserve({{SUFFIX}}* m, size_t need) {
    if (m->cap >= need) {
        return;
    }
    size_t cap = m->cap == 0 ? 8 : m->cap * 2;
    while (cap < need) {
        cap *= 2;
    }
    m->keys = ({{K}}*)realloc(m->keys, cap * sizeof({{K}}));
    m->values = ({{V}}*)realloc(m->values, cap * sizeof({{V}}));
    m->cap = cap;
}

static size_t {{SUFFIX}}_find(const {{SUFFIX}}* m, {{K}} key) {
    for (size_t i = 0; i < m->len; i++) {
        if ({{SUFFIX}}_key_eq(m->keys[i], key)) {
            return i;
        }
    }
    return (size_t)-1;
}

void {{SUFFIX}}_destroy({{SUFFIX}}* m) {
    for (size_t i = 0; i < m->len; i++) {
{{#K_NEEDS_DROP}}        {{K_DROP_FN}}(m->keys[i]);
{{/K_NEEDS_DROP}}{{#V_NEEDS_DROP}}        {{V_DROP_FN}}(m->values[i]);
{{/V_NEEDS_DROP}}    }
    free(m->keys);
    free(m->values);
    m->keys = NULL;
    m->values = NULL;
    m->len = 0;
    m->cap = 0;
}

void {{SUFFIX}}_drop({{SUFFIX}} m) {
    {{SUFFIX}}_destroy(&m);
}

void {{SUFFIX}}_insert({{SUFFIX}}* m, {{K}} key, {{V}} value) {
    size_t found = {{SUFFIX}}_find(m, key);
    if (found != (size_t)-1) {
{{#V_NEEDS_DROP}}        {{V_DROP_FN}}(m->values[found]);
{{/V_NEEDS_DROP}}        m->values[found] = {{#V_NEEDS_COPY}}{{V_COPY_FN}}(value){{/V_NEEDS_COPY}}{{#V_PLAIN_COPY}}value{{/V_PLAIN_COPY}};
        return;
    }
    {{SUFFIX}}_reserve(m, m->len + 1);
    m->keys[m->len] = {{#K_NEEDS_COPY}}{{K_COPY_FN}}(key){{/K_NEEDS_COPY}}{{#K_PLAIN_COPY}}key{{/K_PLAIN_COPY}};
    m->values[m->len] = {{#V_NEEDS_COPY}}{{V_COPY_FN}}(value){{/V_NEEDS_COPY}}{{#V_PLAIN_COPY}}value{{/V_PLAIN_COPY}};
    m->len++;
}

void {{SUFFIX}}_remove({{SUFFIX}}* m, {{K}} key) {
    size_t found = {{SUFFIX}}_find(m, key);
    if (found == (size_t)-1) {
        return;
    }
{{#K_NEEDS_DROP}}    {{K_DROP_FN}}(m->keys[found]);
{{/K_NEEDS_DROP}}{{#V_NEEDS_DROP}}    {{V_DROP_FN}}(m->values[found]);
{{/V_NEEDS_DROP}}    for (size_t i = found; i + 1 < m->len; i++) {
        m->keys[i] = m->keys[i + 1];
        m->values[i] = m->values[i + 1];
    }
    m->len--;
}

bool {{SUFFIX}}_contains(const {{SUFFIX}}* m, {{K}} key) {
    return {{SUFFIX}}_find(m, key) != (size_t)-1;
}

{{V}}* {{SUFFIX}}_get({{SUFFIX}}* m, {{K}} key) {
    size_t found = {{SUFFIX}}_find(m, key);
    if (found == (size_t)-1) {
        return NULL;
    }
    return &m->values[found];
}

size_t {{SUFFIX}}_size(const {{SUFFIX}}* m) {
    return m->len;
}

{{K}}* {{SUFFIX}}_keys({{SUFFIX}}* m) {
    return m->keys;
}

bool {{SUFFIX}}_eq({{SUFFIX}}* a, {{SUFFIX}}* b) {
    if (a->len != b->len) {
        return false;
    }
    for (size_t i = 0; i < a->len; i++) {
        {{V}}* other = {{SUFFIX}}_get(b, a->keys[i]);
        if (other == NULL || !{{SUFFIX}}_value_eq(a->values[i], *other)) {
            return false;
        }
    }
    return true;
}
"#;

/// Ordered unique-element family (`set[T]` → `set_T`)
pub const SET_HEADER: &str = r#"typedef struct {
    {{T}}* data;
    size_t len;
    size_t cap;
} {{SUFFIX}};

{{SUFFIX}} {{SUFFIX}}_new(void);
void {{SUFFIX}}_destroy({{SUFFIX}}* s);
void {{SUFFIX}}_drop({{SUFFIX}} s);
void {{SUFFIX}}_insert({{SUFFIX}}* s, {{T}} value);
void {{SUFFIX}}_remove({{SUFFIX}}* s, {{T}} value);
bool {{SUFFIX}}_contains(const {{SUFFIX}}* s, {{T}} value);
{{T}} {{SUFFIX}}_at(const {{SUFFIX}}* s, size_t index);
size_t {{SUFFIX}}_size(const {{SUFFIX}}* s);
{{T}}* {{SUFFIX}}_items({{SUFFIX}}* s);
bool {{SUFFIX}}_eq(const {{SUFFIX}}* a, const {{SUFFIX}}* b);
"#;

pub const SET_SOURCE: &str = r#"static bool {{SUFFIX}}_elem_eq({{T}} a, {{T}} b) {
    return {{T_EQ_BODY}};
}

{{SUFFIX}} {{SUFFIX}}_new(void) {
    {{SUFFIX}} s = {NULL, 0, 0};
    return s;
}

static size_t {{SUFFIX}}_find(const {{SUFFIX}}* s, {{T}} value) {
    for (size_t i = 0; i < s->len; i++) {
        if ({{SUFFIX}}_elem_eq(s->data[i], value)) {
            return i;
        }
    }
    return (size_t)-1;
}

void {{SUFFIX}}_destroy({{SUFFIX}}* s) {
{{#T_NEEDS_DROP}}    for (size_t i = 0; i < s->len; i++) {
        {{T_DROP_FN}}(s->data[i]);
    }
{{/T_NEEDS_DROP}}    free(s->data);
    s->data = NULL;
    s->len = 0;
    s->cap = 0;
}

void {{SUFFIX}}_drop({{SUFFIX}} s) {
    {{SUFFIX}}_destroy(&s);
}

void {{SUFFIX}}_insert({{SUFFIX}}* s, {{T}} value) {
    if ({{SUFFIX}}_find(s, value) != (size_t)-1) {
        return;
    }
    if (s->cap < s->len + 1) {
        size_t cap = s->cap == 0 ? 8 : s->cap * 2;
        s->data = ({{T}}*)realloc(s->data, cap * sizeof({{T}}));
        s->cap = cap;
    }
    s->data[s->len++] = {{#T_NEEDS_COPY}}{{T_COPY_FN}}(value){{/T_NEEDS_COPY}}{{#T_PLAIN_COPY}}value{{/T_PLAIN_COPY}};
}

void {{SUFFIX}}_remove({{SUFFIX}}* s, {{T}} value) {
    size_t found = {{SUFFIX}}_find(s, value);
    if (found == (size_t)-1) {
        return;
    }
{{#T_NEEDS_DROP}}    {{T_DROP_FN}}(s->data[found]);
{{/T_NEEDS_DROP}}    for (size_t i = found; i + 1 < s->len; i++) {
        s->data[i] = s->data[i + 1];
    }
    s->len--;
}

bool {{SUFFIX}}_contains(const {{SUFFIX}}* s, {{T}} value) {
    return {{SUFFIX}}_find(s, value) != (size_t)-1;
}

{{T}} {{SUFFIX}}_at(const {{SUFFIX}}* s, size_t index) {
    assert(index < s->len);
    return s->data[index];
}

size_t {{SUFFIX}}_size(const {{SUFFIX}}* s) {
    return s->len;
}

{{T}}* {{SUFFIX}}_items({{SUFFIX}}* s) {
    return s->data;
}

bool {{SUFFIX}}_eq(const {{SUFFIX}}* a, const {{SUFFIX}}* b) {
    if (a->len != b->len) {
        return false;
    }
    for (size_t i = 0; i < a->len; i++) {
        if ({{SUFFIX}}_find(b, a->data[i]) == (size_t)-1) {
            return false;
        }
    }
    return true;
}
"#;
